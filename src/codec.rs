//! Wire codec for the Socket.IO v0.7-era packet grammar.
//!
//! Pure functions: bytes to `Packet` and back. No I/O, no shared state.
//! Grammar (applied to a single frame of bytes):
//!
//! ```text
//! frame  = type ":" [id] [ack_marker] ":" [endpoint] [":" data]
//! type   = one decimal digit "0".."8"
//! id     = one or more decimal digits
//! ack_marker = "+"        ; only valid when id is present
//! endpoint   = any bytes except ":"
//! data       = arbitrary bytes, may contain ":" and newlines
//! ```

use serde_json::Value as JsonValue;

use crate::error::Error;

/// Whether the sender of a packet expects an acknowledgement, and in what
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// `ack = true`: a bare Ack is sufficient.
    Bare,
    /// `ack = "data"`: the sender expects a reply Ack carrying arguments.
    Data,
}

/// The three header fields every [`Packet`] carries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub id: Option<String>,
    pub ack: Option<Ack>,
    pub endpoint: Option<String>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_ack(mut self, ack: Ack) -> Self {
        self.ack = Some(ack);
        self
    }
}

/// An ordered multimap name -> values, as produced by
/// `application/x-www-form-urlencoded` parsing (repeated keys preserved in
/// order, same semantics as Python's `urlparse.parse_qs`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryString(Vec<(String, Vec<String>)>);

impl QueryString {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some((_, values)) = self.0.iter_mut().find(|(n, _)| *n == name) {
            values.push(value.into());
        } else {
            self.0.push((name, vec![value.into()]));
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Vec<String>)> {
        self.0.iter()
    }

    fn decode(data: &str) -> Self {
        let mut qs = QueryString::new();
        for (k, v) in url::form_urlencoded::parse(data.as_bytes()) {
            qs.push(k.into_owned(), v.into_owned());
        }
        qs
    }

    fn encode(&self) -> String {
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        for (name, values) in &self.0 {
            for value in values {
                ser.append_pair(name, value);
            }
        }
        ser.finish()
    }
}

/// Reasons, addressed by stable numeric index (equality of the decoded
/// variant is by description, not index).
const REASONS: [&str; 3] = [
    "transport not supported",
    "client not handshaken",
    "unauthorized",
];

/// Advices, addressed by stable numeric index.
const ADVICES: [&str; 1] = ["reconnect"];

fn reason_by_index(s: &str) -> crate::error::Result<&'static str> {
    let idx: usize = s
        .parse()
        .map_err(|_| Error::Decode(format!("invalid reason index {s:?}")))?;
    REASONS
        .get(idx)
        .copied()
        .ok_or_else(|| Error::Decode(format!("reason index out of range: {idx}")))
}

fn advice_by_index(s: &str) -> crate::error::Result<&'static str> {
    let idx: usize = s
        .parse()
        .map_err(|_| Error::Decode(format!("invalid advice index {s:?}")))?;
    ADVICES
        .get(idx)
        .copied()
        .ok_or_else(|| Error::Decode(format!("advice index out of range: {idx}")))
}

fn reason_index(description: &str) -> Option<usize> {
    REASONS.iter().position(|r| *r == description)
}

fn advice_index(description: &str) -> Option<usize> {
    ADVICES.iter().position(|a| *a == description)
}

/// A single decoded Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Disconnect {
        header: Header,
    },
    Connect {
        header: Header,
        qs: QueryString,
    },
    Heartbeat {
        header: Header,
    },
    Message {
        header: Header,
        data: Vec<u8>,
    },
    Json {
        header: Header,
        data: JsonValue,
    },
    Event {
        header: Header,
        name: String,
        args: Vec<JsonValue>,
    },
    Ack {
        header: Header,
        ackid: String,
        args: Vec<JsonValue>,
    },
    Error {
        header: Header,
        reason: String,
        advice: String,
    },
    Noop {
        header: Header,
    },
}

impl Packet {
    pub fn header(&self) -> &Header {
        match self {
            Packet::Disconnect { header }
            | Packet::Connect { header, .. }
            | Packet::Heartbeat { header }
            | Packet::Message { header, .. }
            | Packet::Json { header, .. }
            | Packet::Event { header, .. }
            | Packet::Ack { header, .. }
            | Packet::Error { header, .. }
            | Packet::Noop { header } => header,
        }
    }

    pub fn disconnect() -> Self {
        Packet::Disconnect {
            header: Header::new(),
        }
    }

    pub fn connect(qs: QueryString) -> Self {
        Packet::Connect {
            header: Header::new(),
            qs,
        }
    }

    pub fn heartbeat() -> Self {
        Packet::Heartbeat {
            header: Header::new(),
        }
    }

    pub fn noop() -> Self {
        Packet::Noop {
            header: Header::new(),
        }
    }

    pub fn message(data: impl Into<Vec<u8>>) -> Self {
        Packet::Message {
            header: Header::new(),
            data: data.into(),
        }
    }

    pub fn json(data: JsonValue) -> Self {
        Packet::Json {
            header: Header::new(),
            data,
        }
    }

    pub fn event(name: impl Into<String>, args: Vec<JsonValue>) -> Self {
        Packet::Event {
            header: Header::new(),
            name: name.into(),
            args,
        }
    }

    pub fn ack(ackid: impl Into<String>, args: Vec<JsonValue>) -> Self {
        Packet::Ack {
            header: Header::new(),
            ackid: ackid.into(),
            args,
        }
    }

    pub fn error(reason: impl Into<String>, advice: impl Into<String>) -> Self {
        Packet::Error {
            header: Header::new(),
            reason: reason.into(),
            advice: advice.into(),
        }
    }

    pub fn with_header(mut self, f: impl FnOnce(Header) -> Header) -> Self {
        let header = match &mut self {
            Packet::Disconnect { header }
            | Packet::Connect { header, .. }
            | Packet::Heartbeat { header }
            | Packet::Message { header, .. }
            | Packet::Json { header, .. }
            | Packet::Event { header, .. }
            | Packet::Ack { header, .. }
            | Packet::Error { header, .. }
            | Packet::Noop { header } => header,
        };
        *header = f(std::mem::take(header));
        self
    }

    fn type_code(&self) -> u8 {
        match self {
            Packet::Disconnect { .. } => 0,
            Packet::Connect { .. } => 1,
            Packet::Heartbeat { .. } => 2,
            Packet::Message { .. } => 3,
            Packet::Json { .. } => 4,
            Packet::Event { .. } => 5,
            Packet::Ack { .. } => 6,
            Packet::Error { .. } => 7,
            Packet::Noop { .. } => 8,
        }
    }

    /// The variant-specific payload, serialized. Empty means "no payload
    /// emitted" — the caller omits the third colon entirely in that case.
    fn payload(&self) -> String {
        match self {
            Packet::Disconnect { .. } | Packet::Heartbeat { .. } | Packet::Noop { .. } => {
                String::new()
            }
            Packet::Connect { qs, .. } => {
                if qs.is_empty() {
                    String::new()
                } else {
                    format!("?{}", qs.encode())
                }
            }
            Packet::Message { data, .. } => String::from_utf8_lossy(data).into_owned(),
            Packet::Json { data, .. } => data.to_string(),
            Packet::Event { name, args, .. } => {
                serde_json::json!({"name": name, "args": args}).to_string()
            }
            Packet::Ack { ackid, args, .. } => {
                if args.is_empty() {
                    ackid.clone()
                } else {
                    format!("{}+{}", ackid, JsonValue::Array(args.clone()))
                }
            }
            Packet::Error { reason, advice, .. } => {
                let reason_part = reason
                    .is_empty()
                    .then(String::new)
                    .unwrap_or_else(|| reason_index(reason).unwrap_or(0).to_string());
                if advice.is_empty() {
                    reason_part
                } else {
                    format!("{}+{}", reason_part, advice_index(advice).unwrap_or(0))
                }
            }
        }
    }

    /// Encode this packet to its exact wire representation.
    pub fn encode(&self) -> Vec<u8> {
        let header = self.header();
        let id_ack = match (&header.id, header.ack) {
            (Some(id), Some(Ack::Data)) => format!("{id}+"),
            (Some(id), _) => id.clone(),
            (None, _) => String::new(),
        };
        let endpoint = header.endpoint.as_deref().unwrap_or("");
        let prefix = format!("{}:{}:{}", self.type_code(), id_ack, endpoint);
        let payload = self.payload();
        if payload.is_empty() {
            prefix.into_bytes()
        } else {
            format!("{prefix}:{payload}").into_bytes()
        }
    }

    /// Decode a single frame of bytes into a typed packet.
    pub fn decode(raw: &[u8]) -> crate::error::Result<Self> {
        let malformed = || Error::Decode(format!("malformed packet {:?}", String::from_utf8_lossy(raw)));

        let i1 = raw.iter().position(|&b| b == b':').ok_or_else(malformed)?;
        let type_str = std::str::from_utf8(&raw[..i1]).map_err(|_| malformed())?;
        if type_str.is_empty() || !type_str.bytes().all(|b| b.is_ascii_digit()) || type_str.len() > 3 {
            return Err(malformed());
        }
        let type_code: u32 = type_str.parse().map_err(|_| malformed())?;

        // id (digits) and optional ack marker ('+'), up to the second ':'.
        let mut cursor = i1 + 1;
        let id_start = cursor;
        while cursor < raw.len() && raw[cursor].is_ascii_digit() {
            cursor += 1;
        }
        let id = if cursor > id_start {
            Some(std::str::from_utf8(&raw[id_start..cursor]).unwrap().to_string())
        } else {
            None
        };
        let had_plus = cursor < raw.len() && raw[cursor] == b'+';
        if had_plus {
            cursor += 1;
        }
        if cursor >= raw.len() || raw[cursor] != b':' {
            return Err(malformed());
        }
        let i2 = cursor;

        // endpoint: anything but ':' up to the next ':' (or end of input).
        let rest = &raw[i2 + 1..];
        let (endpoint_bytes, data) = match rest.iter().position(|&b| b == b':') {
            Some(i3) => (&rest[..i3], Some(&rest[i3 + 1..])),
            None => (rest, None),
        };
        let endpoint = if endpoint_bytes.is_empty() {
            None
        } else {
            Some(
                std::str::from_utf8(endpoint_bytes)
                    .map_err(|_| malformed())?
                    .to_string(),
            )
        };

        let ack = id.as_ref().map(|_| if had_plus { Ack::Data } else { Ack::Bare });
        let header = Header { id, ack, endpoint };

        Self::decode_payload(type_code, header, data)
    }

    fn decode_payload(type_code: u32, header: Header, data: Option<&[u8]>) -> crate::error::Result<Self> {
        let malformed_json = || Error::Decode("malformed JSON".to_string());
        match type_code {
            0 => Ok(Packet::Disconnect { header }),
            1 => {
                let qs = match data {
                    Some(d) if !d.is_empty() => {
                        if d[0] != b'?' {
                            return Err(Error::Decode(
                                "Connect payload must begin with '?'".to_string(),
                            ));
                        }
                        let rest = std::str::from_utf8(&d[1..])
                            .map_err(|_| Error::Decode("Connect payload not UTF-8".to_string()))?;
                        QueryString::decode(rest)
                    }
                    _ => QueryString::new(),
                };
                Ok(Packet::Connect { header, qs })
            }
            2 => Ok(Packet::Heartbeat { header }),
            3 => {
                let data = data.map(|d| d.to_vec()).unwrap_or_default();
                Ok(Packet::Message { header, data })
            }
            4 => {
                let data = data.unwrap_or(&[]);
                let value: JsonValue = serde_json::from_slice(data).map_err(|_| malformed_json())?;
                Ok(Packet::Json { header, data: value })
            }
            5 => {
                let data = data.unwrap_or(&[]);
                let value: JsonValue = serde_json::from_slice(data).map_err(|_| malformed_json())?;
                let obj = value
                    .as_object()
                    .ok_or_else(|| Error::Decode("event payload must be an object".to_string()))?;
                let name = obj
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| Error::Decode("event payload missing 'name'".to_string()))?
                    .to_string();
                let args = obj
                    .get("args")
                    .and_then(JsonValue::as_array)
                    .cloned()
                    .unwrap_or_default();
                Ok(Packet::Event { header, name, args })
            }
            6 => {
                let data = data.unwrap_or(&[]);
                let plus = data.iter().position(|&b| b == b'+');
                let (ackid_bytes, args_bytes) = match plus {
                    Some(i) => (&data[..i], Some(&data[i + 1..])),
                    None => (data, None),
                };
                let ackid = std::str::from_utf8(ackid_bytes)
                    .map_err(|_| Error::Decode("ack id not UTF-8".to_string()))?
                    .to_string();
                let args = match args_bytes {
                    Some(b) if !b.is_empty() => {
                        let value: JsonValue = serde_json::from_slice(b).map_err(|_| malformed_json())?;
                        value
                            .as_array()
                            .cloned()
                            .ok_or_else(|| Error::Decode("ack args must be an array".to_string()))?
                    }
                    _ => Vec::new(),
                };
                Ok(Packet::Ack { header, ackid, args })
            }
            7 => {
                let data = data.unwrap_or(&[]);
                let plus = data.iter().position(|&b| b == b'+');
                let (reason_bytes, advice_bytes) = match plus {
                    Some(i) => (&data[..i], &data[i + 1..]),
                    None => (data, &data[data.len()..]),
                };
                let reason = if reason_bytes.is_empty() {
                    String::new()
                } else {
                    let s = std::str::from_utf8(reason_bytes).map_err(|_| Error::Decode("reason not UTF-8".to_string()))?;
                    reason_by_index(s)?.to_string()
                };
                let advice = if advice_bytes.is_empty() {
                    String::new()
                } else {
                    let s = std::str::from_utf8(advice_bytes).map_err(|_| Error::Decode("advice not UTF-8".to_string()))?;
                    advice_by_index(s)?.to_string()
                };
                Ok(Packet::Error { header, reason, advice })
            }
            8 => Ok(Packet::Noop { header }),
            other => Err(Error::Decode(format!("unknown packet type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(s: &str) -> Packet {
        Packet::decode(s.as_bytes()).unwrap_or_else(|e| panic!("decode {s:?} failed: {e}"))
    }

    #[test]
    fn decode_error_empty() {
        let p = decode("7:::");
        assert_eq!(p, Packet::Error { header: Header::new(), reason: "".into(), advice: "".into() });
    }

    #[test]
    fn decode_error_reason_only() {
        let p = decode("7:::0");
        match p {
            Packet::Error { reason, advice, .. } => {
                assert_eq!(reason, "transport not supported");
                assert_eq!(advice, "");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_error_reason_and_advice() {
        let p = decode("7:::2+0");
        match p {
            Packet::Error { reason, advice, .. } => {
                assert_eq!(reason, "unauthorized");
                assert_eq!(advice, "reconnect");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_error_with_endpoint() {
        let p = decode("7::/woot");
        match p {
            Packet::Error { header, reason, advice } => {
                assert_eq!(header.endpoint.as_deref(), Some("/woot"));
                assert_eq!(reason, "");
                assert_eq!(advice, "");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_ack_no_args() {
        let p = decode("6:::140");
        match p {
            Packet::Ack { ackid, args, .. } => {
                assert_eq!(ackid, "140");
                assert!(args.is_empty());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_ack_with_args() {
        let p = decode(r#"6:::12+["woot","wa"]"#);
        match p {
            Packet::Ack { ackid, args, .. } => {
                assert_eq!(ackid, "12");
                assert_eq!(args, vec![JsonValue::from("woot"), JsonValue::from("wa")]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_ack_malformed_json() {
        let err = Packet::decode(br#"6:::1+{"++]"#).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn decode_json_string() {
        let p = decode(r#"4:::"2""#);
        match p {
            Packet::Json { data, .. } => assert_eq!(data, JsonValue::from("2")),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_json_with_id_and_data_ack() {
        let p = decode(r#"4:1+::{"a":"b"}"#);
        match p {
            Packet::Json { header, data } => {
                assert_eq!(header.id.as_deref(), Some("1"));
                assert_eq!(header.ack, Some(Ack::Data));
                assert_eq!(data, serde_json::json!({"a": "b"}));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_event_no_args() {
        let p = decode(r#"5:::{"name":"woot"}"#);
        match p {
            Packet::Event { name, args, .. } => {
                assert_eq!(name, "woot");
                assert!(args.is_empty());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_event_with_args() {
        let p = decode(r#"5:::{"name":"edwald","args":[{"a":"b"},2,"3"]}"#);
        match p {
            Packet::Event { name, args, .. } => {
                assert_eq!(name, "edwald");
                assert_eq!(args.len(), 3);
                assert_eq!(args[0], serde_json::json!({"a": "b"}));
                assert_eq!(args[1], JsonValue::from(2));
                assert_eq!(args[2], JsonValue::from("3"));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_message() {
        let p = decode("3:::woot");
        match p {
            Packet::Message { data, .. } => assert_eq!(data, b"woot"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_message_with_id_ack_endpoint_no_data() {
        let p = decode("3:5:/tobi");
        match p {
            Packet::Message { header, data } => {
                assert_eq!(header.id.as_deref(), Some("5"));
                assert_eq!(header.ack, Some(Ack::Bare));
                assert_eq!(header.endpoint.as_deref(), Some("/tobi"));
                assert!(data.is_empty());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_heartbeat() {
        let p = decode("2:::");
        assert_eq!(p, Packet::Heartbeat { header: Header::new() });
    }

    #[test]
    fn decode_connect_with_endpoint() {
        let p = decode("1::/tobi");
        match p {
            Packet::Connect { header, qs } => {
                assert_eq!(header.endpoint.as_deref(), Some("/tobi"));
                assert!(qs.is_empty());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_connect_with_qs() {
        let p = decode("1::/test:?test=1");
        match p {
            Packet::Connect { header, qs } => {
                assert_eq!(header.endpoint.as_deref(), Some("/test"));
                assert_eq!(qs.get("test"), Some(&["1".to_string()][..]));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_disconnect_with_endpoint() {
        let p = decode("0::/woot");
        match p {
            Packet::Disconnect { header } => assert_eq!(header.endpoint.as_deref(), Some("/woot")),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_message_with_newline_data() {
        let p = decode("3:::\n");
        match p {
            Packet::Message { data, .. } => assert_eq!(data, b"\n"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn encode_scenarios() {
        assert_eq!(Packet::error("", "").encode(), b"7::");
        assert_eq!(
            Packet::error("transport not supported", "").encode(),
            b"7:::0"
        );
        assert_eq!(
            Packet::error("unauthorized", "reconnect").encode(),
            b"7:::2+0"
        );
        assert_eq!(
            Packet::error("", "").with_header(|h| h.with_endpoint("/woot")).encode(),
            b"7::/woot"
        );
        assert_eq!(Packet::ack("140", vec![]).encode(), b"6:::140");
        assert_eq!(Packet::message("woot").encode(), b"3:::woot");
        assert_eq!(
            Packet::message("")
                .with_header(|h| h.with_id("5").with_ack(Ack::Bare).with_endpoint("/tobi"))
                .encode(),
            b"3:5:/tobi"
        );
        assert_eq!(Packet::heartbeat().encode(), b"2::");
        assert_eq!(
            Packet::connect(QueryString::new()).with_header(|h| h.with_endpoint("/tobi")).encode(),
            b"1::/tobi"
        );
        assert_eq!(
            Packet::disconnect().with_header(|h| h.with_endpoint("/woot")).encode(),
            b"0::/woot"
        );
    }

    #[test]
    fn round_trips() {
        let samples = [
            Packet::heartbeat(),
            Packet::noop(),
            Packet::disconnect().with_header(|h| h.with_endpoint("/chat")),
            Packet::message("hello world"),
            Packet::json(serde_json::json!({"a": 1, "b": [1,2,3]})),
            Packet::event("login", vec![serde_json::json!({"name": "tobi"})]),
            Packet::ack("1", vec![JsonValue::from(true)]),
            Packet::error("unauthorized", "reconnect"),
        ];
        for p in samples {
            let encoded = p.encode();
            let decoded = Packet::decode(&encoded).unwrap();
            assert_eq!(decoded, p, "round trip mismatch for {:?}", encoded);
        }
    }

    #[test]
    fn unknown_type_is_decode_error() {
        let err = Packet::decode(b"9:::").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn no_colon_is_decode_error() {
        let err = Packet::decode(b"garbage").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
