//! Forward rule record and its firewall-cmd text form
//!
//! firewalld lists forwards one per line as
//! `port=<p>:proto=<proto>:toport=<tp>:toaddr=<addr>`.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A single port-forward rule as reported by the firewall service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardRule {
    pub port: String,
    pub protocol: String,
    pub toport: String,
    pub toaddr: String,
}

impl ForwardRule {
    pub fn new(port: &str, protocol: &str, toport: &str, toaddr: &str) -> Self {
        Self {
            port: port.to_string(),
            protocol: protocol.to_string(),
            toport: toport.to_string(),
            toaddr: toaddr.to_string(),
        }
    }

    /// Render as a numbered table row for the listing view.
    pub fn table_row(&self, index: usize) -> String {
        format!(
            "| {} | FromPort: {} | ToPort: {} | IpAddress: {:<15} | Protocol:{}",
            index, self.port, self.toport, self.toaddr, self.protocol
        )
    }

    /// Confirmation line printed after the rule has been removed.
    pub fn removed_line(&self) -> String {
        format!(
            "Removed forwarding FromPort: {} | ToPort: {} | IpAddress: {:<15} | Protocol:{}",
            self.port, self.toport, self.toaddr, self.protocol
        )
    }
}

/// firewall-cmd argument form, e.g. `port=2222:proto=tcp:toport=3389:toaddr=192.168.2.5`
impl fmt::Display for ForwardRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "port={}:proto={}:toport={}:toaddr={}",
            self.port, self.protocol, self.toport, self.toaddr
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed forward rule: {0:?}")]
pub struct ParseRuleError(pub String);

impl FromStr for ForwardRule {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let malformed = || ParseRuleError(line.to_string());

        // toaddr is last and may itself contain ':' (IPv6), so split on the
        // field markers in order rather than on every colon.
        let rest = line.strip_prefix("port=").ok_or_else(malformed)?;
        let (port, rest) = rest.split_once(":proto=").ok_or_else(malformed)?;
        let (protocol, rest) = rest.split_once(":toport=").ok_or_else(malformed)?;
        let (toport, rest) = match rest.split_once(":toaddr=") {
            Some((toport, toaddr)) => (toport, toaddr),
            None => (rest, ""),
        };

        if port.is_empty() || protocol.is_empty() {
            return Err(malformed());
        }

        Ok(Self::new(port, protocol, toport, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_line() {
        let rule: ForwardRule = "port=2222:proto=tcp:toport=3389:toaddr=192.168.2.5"
            .parse()
            .unwrap();
        assert_eq!(rule, ForwardRule::new("2222", "tcp", "3389", "192.168.2.5"));
    }

    #[test]
    fn test_parse_ipv6_and_empty_toaddr() {
        let rule: ForwardRule = "port=80:proto=tcp:toport=8080:toaddr=fd00::1".parse().unwrap();
        assert_eq!(rule.toaddr, "fd00::1");

        let rule: ForwardRule = "port=80:proto=tcp:toport=8080:toaddr=".parse().unwrap();
        assert_eq!(rule.toaddr, "");
        assert_eq!(rule.toport, "8080");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<ForwardRule>().is_err());
        assert!("Warning: ALREADY_ENABLED".parse::<ForwardRule>().is_err());
        assert!("port=:proto=tcp:toport=1".parse::<ForwardRule>().is_err());
    }

    #[test]
    fn test_display_matches_firewall_cmd_syntax() {
        let rule = ForwardRule::new("2222", "tcp", "3389", "192.168.2.5");
        assert_eq!(
            rule.to_string(),
            "port=2222:proto=tcp:toport=3389:toaddr=192.168.2.5"
        );
        assert_eq!(rule.to_string().parse::<ForwardRule>().unwrap(), rule);
    }

    #[test]
    fn test_table_row_pads_address() {
        let rule = ForwardRule::new("2222", "tcp", "3389", "192.168.2.5");
        assert_eq!(
            rule.table_row(0),
            "| 0 | FromPort: 2222 | ToPort: 3389 | IpAddress: 192.168.2.5     | Protocol:tcp"
        );
        assert_eq!(
            rule.removed_line(),
            "Removed forwarding FromPort: 2222 | ToPort: 3389 | IpAddress: 192.168.2.5     | Protocol:tcp"
        );
    }
}
