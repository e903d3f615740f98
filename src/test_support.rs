use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

pub(crate) struct CapturedRequest {
    pub head: String,
    pub body: String,
}

/// A local HTTP endpoint that answers exactly one request with a canned response.
pub(crate) struct OneShotServer {
    pub url: String,
    handle: JoinHandle<CapturedRequest>,
}

impl OneShotServer {
    pub fn finish(self) -> CapturedRequest {
        self.handle.join().expect("server thread should join")
    }
}

pub(crate) fn serve_once(status_line: &str, body: &str) -> OneShotServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("address should be available");
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should succeed");
        let captured = read_request(&mut stream);
        stream
            .write_all(response.as_bytes())
            .expect("response should be written");
        captured
    });

    OneShotServer {
        url: format!("http://{addr}/v1/chat/completions"),
        handle,
    }
}

fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk).expect("request should be readable");
        if read == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..read]);

        if let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let body_start = end + 4;
            if buf.len() >= body_start + content_length(&head) {
                let body = String::from_utf8_lossy(&buf[body_start..]).to_string();
                return CapturedRequest { head, body };
            }
        }
    }

    CapturedRequest {
        head: String::from_utf8_lossy(&buf).to_string(),
        body: String::new(),
    }
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
