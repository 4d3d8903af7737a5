use runslot::error::ParseError;
use runslot::protocol::{Request, Response};
use tokio::io::BufReader;

#[test]
fn parse_run_with_arguments() {
    let req = Request::parse("run\0echo\0hello world").unwrap();
    assert_eq!(
        req,
        Request::Run {
            argv: vec!["echo".to_string(), "hello world".to_string()],
        }
    );
}

#[test]
fn parse_run_without_arguments_is_an_error() {
    assert_eq!(
        Request::parse("run").unwrap_err(),
        ParseError::MissingCommandLine
    );
    assert_eq!(
        Request::parse("run\0").unwrap_err(),
        ParseError::MissingCommandLine
    );
}

#[test]
fn parse_kill() {
    let req = Request::parse("kill\0abcdefghijklmnop").unwrap();
    assert_eq!(
        req,
        Request::Kill {
            id: "abcdefghijklmnop".to_string(),
        }
    );
    assert_eq!(Request::parse("kill").unwrap_err(), ParseError::KillArity);
    assert_eq!(
        Request::parse("kill\0a\0b").unwrap_err(),
        ParseError::KillArity
    );
}

#[test]
fn parse_log_with_and_without_offset() {
    assert_eq!(
        Request::parse("log\0someid").unwrap(),
        Request::Log {
            id: "someid".to_string(),
            offset: 0,
        }
    );
    assert_eq!(
        Request::parse("log\0someid\042").unwrap(),
        Request::Log {
            id: "someid".to_string(),
            offset: 42,
        }
    );
}

#[test]
fn parse_log_rejects_bad_offset() {
    assert_eq!(
        Request::parse("log\0someid\0x").unwrap_err(),
        ParseError::InvalidOffset("x".to_string())
    );
    assert_eq!(
        Request::parse("log\0a\0b\0c").unwrap_err(),
        ParseError::LogArity
    );
}

#[test]
fn parse_status_variants() {
    assert_eq!(Request::parse("status").unwrap(), Request::Status { id: None });
    assert_eq!(
        Request::parse("status\0someid").unwrap(),
        Request::Status {
            id: Some("someid".to_string()),
        }
    );
    assert_eq!(
        Request::parse("status\0a\0b").unwrap_err(),
        ParseError::StatusArity
    );
}

#[test]
fn parse_recent() {
    assert_eq!(Request::parse("recent").unwrap(), Request::Recent);
    assert_eq!(
        Request::parse("recent\0extra").unwrap_err(),
        ParseError::RecentArity
    );
}

#[test]
fn parse_unrecognized_command() {
    assert_eq!(
        Request::parse("reboot\0now").unwrap(),
        Request::Unrecognized {
            command: "reboot".to_string(),
        }
    );
    // An empty line is an empty command name, not a parse error.
    assert_eq!(
        Request::parse("").unwrap(),
        Request::Unrecognized {
            command: String::new(),
        }
    );
}

#[test]
fn encode_header_shape() {
    let encoded = Response::new(200, "Spawned process")
        .with_body("abcdefghijklmnop")
        .encode();
    assert_eq!(
        encoded,
        b"200 16 Spawned process\nabcdefghijklmnop".to_vec()
    );
}

#[test]
fn encode_empty_body() {
    let encoded = Response::new(404, "Not running").encode();
    assert_eq!(encoded, b"404 0 Not running\n".to_vec());
}

#[tokio::test]
async fn decode_matches_encode() {
    let original = Response::new(200, "Log follows").with_body(vec![0u8, 1, 2, b'\n', 255]);
    let encoded = original.encode();

    let mut reader = BufReader::new(&encoded[..]);
    let decoded = Response::read_from(&mut reader).await.unwrap();
    assert_eq!(decoded, original);
}

#[tokio::test]
async fn decode_rejects_garbage_header() {
    let mut reader = BufReader::new(&b"not a header\n"[..]);
    assert!(Response::read_from(&mut reader).await.is_err());
}
