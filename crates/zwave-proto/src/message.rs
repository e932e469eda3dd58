//! Decoded message model.
//!
//! A [`Message`] is one SOF frame plus the derived fields (node id, callback
//! id, callback status, command class) whose byte positions depend on the
//! (message type, function) pair. The extraction rules are a fixed lookup,
//! not a uniform layout; functions the driver does not know about decode
//! with all derived fields unset rather than failing.

use crate::constants::*;
use crate::error::ProtoError;

/// Whether a message was received from or sent to the transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Transceiver → host.
    Inbound,
    /// Host → transceiver.
    Outbound,
}

/// Serial API message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Host-initiated command or transceiver-initiated callback.
    Request,
    /// Immediate answer to a request.
    Response,
}

impl MessageType {
    /// Parse the message type byte.
    pub fn from_byte(byte: u8) -> Result<Self, ProtoError> {
        match byte {
            MSG_TYPE_REQUEST => Ok(MessageType::Request),
            MSG_TYPE_RESPONSE => Ok(MessageType::Response),
            other => Err(ProtoError::UnknownMessageType(other)),
        }
    }

    /// Wire byte for this message type.
    pub fn as_byte(&self) -> u8 {
        match self {
            MessageType::Request => MSG_TYPE_REQUEST,
            MessageType::Response => MSG_TYPE_RESPONSE,
        }
    }
}

/// One decoded serial API transaction unit.
#[derive(Debug, Clone)]
pub struct Message {
    /// Transfer direction.
    pub direction: Direction,
    /// Request or response.
    pub message_type: MessageType,
    /// Serial API function id.
    pub function: u8,
    /// Addressed or originating node, when the layout carries one.
    pub node_id: Option<u8>,
    /// Correlation tag for asynchronous callbacks.
    pub callback_id: Option<u8>,
    /// Callback/transmit status, when the layout carries one.
    pub callback_status: Option<u8>,
    /// Command class of the application payload, when present.
    pub command_class: Option<u8>,
    /// Complete frame bytes, SOF through checksum.
    pub raw: Vec<u8>,
}

impl Message {
    /// Parse a complete inbound SOF frame (checksum already verified).
    pub fn parse(frame: &[u8]) -> Result<Self, ProtoError> {
        if frame.len() < 5 {
            return Err(ProtoError::FrameTooShort {
                expected: 5,
                actual: frame.len(),
            });
        }
        let message_type = MessageType::from_byte(frame[2])?;
        let function = frame[3];

        let mut msg = Message {
            direction: Direction::Inbound,
            message_type,
            function,
            node_id: None,
            callback_id: None,
            callback_status: None,
            command_class: None,
            raw: frame.to_vec(),
        };

        // Fixed extraction table. Offsets are into the raw frame:
        // [0]=SOF [1]=len [2]=type [3]=func [4..]=body.
        match (message_type, function) {
            (MessageType::Request, FUNC_APPLICATION_COMMAND_HANDLER) => {
                // [4]=rxStatus [5]=srcNode [6]=cmdLen [7]=commandClass ...
                if frame.len() >= 9 {
                    msg.node_id = Some(frame[5]);
                    msg.command_class = Some(frame[7]);
                }
            }
            (MessageType::Request, FUNC_SEND_DATA) => {
                // [4]=callbackId [5]=txStatus
                if frame.len() >= 7 {
                    msg.callback_id = Some(frame[4]);
                    msg.callback_status = Some(frame[5]);
                }
            }
            (MessageType::Response, FUNC_SEND_DATA) => {
                // [4]=retval (frame accepted by the transceiver)
                if frame.len() >= 6 {
                    msg.callback_status = Some(frame[4]);
                }
            }
            (MessageType::Request, FUNC_APPLICATION_UPDATE) => {
                // [4]=updateState [5]=node
                if frame.len() >= 7 {
                    msg.callback_status = Some(frame[4]);
                    msg.node_id = Some(frame[5]);
                }
            }
            (
                MessageType::Request,
                FUNC_ADD_NODE_TO_NETWORK | FUNC_REMOVE_NODE_FROM_NETWORK,
            ) => {
                // [4]=callbackId [5]=status [6]=node
                if frame.len() >= 8 {
                    msg.callback_id = Some(frame[4]);
                    msg.callback_status = Some(frame[5]);
                    msg.node_id = Some(frame[6]);
                }
            }
            (
                MessageType::Request,
                FUNC_REQUEST_NODE_NEIGHBOR_UPDATE
                | FUNC_REMOVE_FAILED_NODE
                | FUNC_REPLACE_FAILED_NODE,
            ) => {
                // [4]=callbackId [5]=status
                if frame.len() >= 7 {
                    msg.callback_id = Some(frame[4]);
                    msg.callback_status = Some(frame[5]);
                }
            }
            (MessageType::Response, FUNC_MEMORY_GET_ID) => {
                // [4..8]=homeId [8]=controller node id
                if frame.len() >= 10 {
                    msg.node_id = Some(frame[8]);
                }
            }
            // Responses such as GetNodeProtocolInfo carry no node id field;
            // the driver inherits it from the pending outbound request.
            _ => {}
        }

        Ok(msg)
    }

    /// Wrap an already encoded outbound frame.
    pub fn outbound(
        raw: Vec<u8>,
        function: u8,
        node_id: Option<u8>,
        callback_id: Option<u8>,
        command_class: Option<u8>,
    ) -> Self {
        Message {
            direction: Direction::Outbound,
            message_type: MessageType::Request,
            function,
            node_id,
            callback_id,
            callback_status: None,
            command_class,
            raw,
        }
    }

    /// Function-specific body: everything between the function id and the
    /// checksum.
    pub fn payload(&self) -> &[u8] {
        if self.raw.len() < 5 {
            return &[];
        }
        &self.raw[4..self.raw.len() - 1]
    }

    /// Whether this outbound message expects an asynchronous callback.
    pub fn expects_callback(&self) -> bool {
        self.callback_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{checksum, FrameEncoder};

    fn inbound(msg_type: u8, function: u8, body: &[u8]) -> Vec<u8> {
        let mut frame = vec![SOF, (body.len() + 3) as u8, msg_type, function];
        frame.extend_from_slice(body);
        frame.push(checksum(&frame[1..]));
        frame
    }

    #[test]
    fn test_parse_application_command() {
        // rxStatus=0, srcNode=7, cmdLen=3, class=0x25, cmd=0x03, value=0xFF
        let frame = inbound(
            MSG_TYPE_REQUEST,
            FUNC_APPLICATION_COMMAND_HANDLER,
            &[0x00, 0x07, 0x03, 0x25, 0x03, 0xFF],
        );
        let msg = Message::parse(&frame).unwrap();
        assert_eq!(msg.message_type, MessageType::Request);
        assert_eq!(msg.node_id, Some(7));
        assert_eq!(msg.command_class, Some(0x25));
    }

    #[test]
    fn test_parse_send_data_callback() {
        let frame = inbound(MSG_TYPE_REQUEST, FUNC_SEND_DATA, &[0x21, 0x00, 0x00]);
        let msg = Message::parse(&frame).unwrap();
        assert_eq!(msg.callback_id, Some(0x21));
        assert_eq!(msg.callback_status, Some(TRANSMIT_COMPLETE_OK));
    }

    #[test]
    fn test_parse_response_without_node_id() {
        // GetNodeProtocolInfo response: capability bytes only.
        let frame = inbound(
            MSG_TYPE_RESPONSE,
            FUNC_GET_NODE_PROTOCOL_INFO,
            &[0x93, 0x16, 0x01, 0x02, 0x02, 0x01],
        );
        let msg = Message::parse(&frame).unwrap();
        assert_eq!(msg.node_id, None);
        assert_eq!(msg.callback_id, None);
    }

    #[test]
    fn test_encode_parse_roundtrip() {
        let mut enc = FrameEncoder::new();
        let payload = [0x05, 0x03, 0x25, 0x01, 0xFF, 0x25];
        let (frame, cb) = enc
            .encode(MSG_TYPE_REQUEST, FUNC_SEND_DATA, &payload, true)
            .unwrap();
        assert!(cb.is_some());

        let msg = Message::parse(&frame).unwrap();
        assert_eq!(msg.message_type, MessageType::Request);
        assert_eq!(msg.function, FUNC_SEND_DATA);
        assert_eq!(&msg.payload()[..payload.len()], &payload);
    }

    #[test]
    fn test_parse_rejects_short_frame() {
        let err = Message::parse(&[SOF, 0x03, 0x00]).unwrap_err();
        assert!(matches!(err, ProtoError::FrameTooShort { .. }));
    }
}
