// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Line-oriented TCP client shared by the rigctl and remote-control sides.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

use crate::endpoint::Endpoint;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const IO_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_LINE_BYTES: u64 = 4 * 1024;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{peer}: connect to {addr} failed: {source}")]
    Connect {
        peer: &'static str,
        addr: String,
        source: std::io::Error,
    },
    #[error("{peer}: {what} timed out after {timeout:?}")]
    Timeout {
        peer: &'static str,
        what: &'static str,
        timeout: Duration,
    },
    #[error("{peer}: {source}")]
    Io {
        peer: &'static str,
        source: std::io::Error,
    },
    #[error("{0}: connection closed")]
    Closed(&'static str),
    #[error("{peer}: '{command}' rejected ({reply})")]
    Rejected {
        peer: &'static str,
        command: String,
        reply: String,
    },
    #[error("{peer}: unexpected reply '{reply}' to '{command}'")]
    UnexpectedReply {
        peer: &'static str,
        command: String,
        reply: String,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;

/// One request/reply connection; replies are read line by line.
pub struct LineClient {
    peer: &'static str,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl LineClient {
    pub async fn connect(peer: &'static str, endpoint: &Endpoint) -> SyncResult<Self> {
        let addr = endpoint.connect_addr();
        let stream = time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| SyncError::Timeout {
                peer,
                what: "connect",
                timeout: CONNECT_TIMEOUT,
            })?
            .map_err(|source| SyncError::Connect { peer, addr, source })?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            peer,
            reader: BufReader::new(reader),
            writer,
        })
    }

    pub async fn send(&mut self, command: &str) -> SyncResult<()> {
        debug!("{} <- {}", self.peer, command);
        let peer = self.peer;
        let line = format!("{}\n", command);
        time::timeout(IO_TIMEOUT, async {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.flush().await
        })
        .await
        .map_err(|_| SyncError::Timeout {
            peer,
            what: "write",
            timeout: IO_TIMEOUT,
        })?
        .map_err(|source| SyncError::Io { peer, source })
    }

    /// Next reply line without its terminator.
    pub async fn read_line(&mut self) -> SyncResult<String> {
        let peer = self.peer;
        let mut line = String::new();
        let mut limited = (&mut self.reader).take(MAX_LINE_BYTES);
        let n = time::timeout(IO_TIMEOUT, limited.read_line(&mut line))
            .await
            .map_err(|_| SyncError::Timeout {
                peer,
                what: "read",
                timeout: IO_TIMEOUT,
            })?
            .map_err(|source| SyncError::Io { peer, source })?;
        if n == 0 {
            return Err(SyncError::Closed(peer));
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        debug!("{} -> {}", peer, line);
        Ok(line)
    }

    /// Send a query and return its first reply line. An `RPRT` line in
    /// place of a value is an error report.
    pub async fn query(&mut self, command: &str) -> SyncResult<String> {
        self.send(command).await?;
        let reply = self.read_line().await?;
        if reply.starts_with("RPRT") {
            return Err(self.rejected(command, reply));
        }
        Ok(reply)
    }

    /// Query a value that must parse as `T`.
    pub async fn query_number<T: std::str::FromStr>(&mut self, command: &str) -> SyncResult<T> {
        let reply = self.query(command).await?;
        reply
            .trim()
            .parse()
            .map_err(|_| SyncError::UnexpectedReply {
                peer: self.peer,
                command: command.to_string(),
                reply,
            })
    }

    /// Send a set command and require `RPRT 0`.
    pub async fn set(&mut self, command: &str) -> SyncResult<()> {
        self.send(command).await?;
        let reply = self.read_line().await?;
        match reply.trim() {
            "RPRT 0" => Ok(()),
            other if other.starts_with("RPRT") => Err(self.rejected(command, reply)),
            _ => Err(SyncError::UnexpectedReply {
                peer: self.peer,
                command: command.to_string(),
                reply,
            }),
        }
    }

    fn rejected(&self, command: &str, reply: String) -> SyncError {
        SyncError::Rejected {
            peer: self.peer,
            command: command.to_string(),
            reply,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Reply to each received line with the next canned reply.
    async fn canned_server(replies: Vec<&'static str>) -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    return;
                }
                writer.write_all(reply.as_bytes()).await.unwrap();
            }
        });
        Endpoint {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_query_and_set() {
        let ep = canned_server(vec!["145500000\n", "RPRT 0\n", "RPRT 1\n", "oops\n"]).await;
        let mut client = LineClient::connect("remote", &ep).await.unwrap();

        let hz: u64 = client.query_number("f").await.unwrap();
        assert_eq!(hz, 145_500_000);
        client.set("F 1").await.unwrap();
        assert!(matches!(
            client.set("F 2").await,
            Err(SyncError::Rejected { .. })
        ));
        assert!(matches!(
            client.query_number::<u64>("f").await,
            Err(SyncError::UnexpectedReply { .. })
        ));
        assert!(matches!(
            client.query("f").await,
            Err(SyncError::Closed(_) | SyncError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_reports_rprt_as_rejection() {
        let ep = canned_server(vec!["RPRT -11\n"]).await;
        let mut client = LineClient::connect("rig", &ep).await.unwrap();
        let err = client.query("m").await.unwrap_err();
        assert!(err.to_string().contains("RPRT -11"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let ep = Endpoint {
            host: "127.0.0.1".to_string(),
            port,
        };
        assert!(matches!(
            LineClient::connect("rig", &ep).await,
            Err(SyncError::Connect { .. })
        ));
    }
}
