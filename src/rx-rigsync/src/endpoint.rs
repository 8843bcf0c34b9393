// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! `host[:port]` endpoints for the rigctl and remote-control connections.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn connect_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.connect_addr())
    }
}

/// Parse `host`, `host:port`, `[v6]` or `[v6]:port`, an optional `tcp://`
/// prefix included.
pub fn parse_endpoint(input: &str, default_port: u16) -> Result<Endpoint, String> {
    let trimmed = input.trim();
    let addr = trimmed.strip_prefix("tcp://").unwrap_or(trimmed);
    if addr.is_empty() {
        return Err("address is empty".into());
    }

    if let Some(rest) = addr.strip_prefix('[') {
        let closing = rest
            .find(']')
            .ok_or("invalid address: missing closing ']' for IPv6 host")?;
        let host = &rest[..closing];
        if host.is_empty() {
            return Err("invalid address: host is empty".into());
        }
        let port = match &rest[closing + 1..] {
            "" => default_port,
            remainder => match remainder.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None => return Err("invalid address: expected ':<port>' after ']'".into()),
            },
        };
        return Ok(Endpoint {
            host: host.to_string(),
            port,
        });
    }

    match addr.matches(':').count() {
        0 => Ok(Endpoint {
            host: addr.to_string(),
            port: default_port,
        }),
        1 => {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or("invalid address: expected host:port")?;
            if host.is_empty() {
                return Err("invalid address: host is empty".into());
            }
            Ok(Endpoint {
                host: host.to_string(),
                port: parse_port(port)?,
            })
        }
        _ => Err("invalid address: IPv6 host must be bracketed like [::1]:4532".into()),
    }
}

fn parse_port(port_str: &str) -> Result<u16, String> {
    let port: u16 = port_str
        .parse()
        .map_err(|_| format!("invalid port: '{port_str}'"))?;
    if port == 0 {
        return Err("invalid port: 0".into());
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_default_port() {
        let ep = parse_endpoint("localhost", 4532).unwrap();
        assert_eq!(ep.host, "localhost");
        assert_eq!(ep.port, 4532);
    }

    #[test]
    fn parse_ipv4_with_port() {
        let ep = parse_endpoint("tcp://192.168.1.5:7400", 7356).unwrap();
        assert_eq!(ep.host, "192.168.1.5");
        assert_eq!(ep.port, 7400);
        assert_eq!(ep.connect_addr(), "192.168.1.5:7400");
    }

    #[test]
    fn parse_bracketed_ipv6() {
        let ep = parse_endpoint("[::1]:7356", 1).unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, 7356);
        assert_eq!(ep.connect_addr(), "[::1]:7356");
        assert_eq!(parse_endpoint("[::1]", 4532).unwrap().port, 4532);
    }

    #[test]
    fn reject_bad_addresses() {
        assert!(parse_endpoint("", 1).is_err());
        assert!(parse_endpoint("::1:7356", 1).is_err());
        assert!(parse_endpoint("host:0", 1).is_err());
        assert!(parse_endpoint(":4532", 1).is_err());
        assert!(parse_endpoint("[::1]x", 1).is_err());
    }
}
