//! Protobuf wire format of a log group write.

use prost::Message;

use super::{LogGroup, LogServiceError};

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct LogContentPb {
    #[prost(string, required, tag = "1")]
    pub key: String,
    #[prost(string, required, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct LogPb {
    #[prost(uint32, required, tag = "1")]
    pub time: u32,
    #[prost(message, repeated, tag = "2")]
    pub contents: Vec<LogContentPb>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct LogGroupPb {
    #[prost(message, repeated, tag = "1")]
    pub logs: Vec<LogPb>,
    #[prost(string, optional, tag = "3")]
    pub topic: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub source: Option<String>,
}

impl From<&LogGroup> for LogGroupPb {
    fn from(group: &LogGroup) -> Self {
        LogGroupPb {
            logs: group
                .logs
                .iter()
                .map(|item| LogPb {
                    time: item.time,
                    contents: item
                        .contents
                        .iter()
                        .map(|(key, value)| LogContentPb {
                            key: key.clone(),
                            value: value.clone(),
                        })
                        .collect(),
                })
                .collect(),
            topic: group.topic.clone(),
            source: group.source.clone(),
        }
    }
}

pub(crate) fn encode_log_group(group: &LogGroup) -> Result<Vec<u8>, LogServiceError> {
    let message = LogGroupPb::from(group);
    let mut buf = Vec::with_capacity(message.encoded_len());
    message
        .encode(&mut buf)
        .map_err(|e| LogServiceError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logservice::LogItem;

    #[test]
    fn test_encode_single_log() {
        let group = LogGroup {
            topic: None,
            source: None,
            logs: vec![LogItem {
                time: 1,
                contents: vec![("a".to_string(), "b".to_string())],
            }],
        };
        let bytes = encode_log_group(&group).unwrap();
        assert_eq!(
            bytes,
            vec![0x0A, 0x0A, 0x08, 0x01, 0x12, 0x06, 0x0A, 0x01, 0x61, 0x12, 0x01, 0x62]
        );
    }

    #[test]
    fn test_topic_and_source_decode_back() {
        let group = LogGroup {
            topic: Some("t".to_string()),
            source: Some("s".to_string()),
            logs: vec![],
        };
        let bytes = encode_log_group(&group).unwrap();
        let decoded = LogGroupPb::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.topic.as_deref(), Some("t"));
        assert_eq!(decoded.source.as_deref(), Some("s"));
        assert!(decoded.logs.is_empty());
    }
}
