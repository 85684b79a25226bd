//! Forwarding-rule controller and the per-run session around it
//!
//! The controller is stateless: it forwards list/add/remove to the backend
//! and prints confirmations. [`Session`] adds the rule snapshot that
//! interactive deletion indexes into.

use std::io::Write;
use tracing::{debug, info};

use crate::config::FirewallConfig;
use crate::firewall::{FirewallBackend, FirewallError};
use crate::rule::ForwardRule;

/// Protocol used for every forward this tool creates.
pub const FORWARD_PROTOCOL: &str = "tcp";

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Firewall(#[from] FirewallError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

pub struct ForwardController<B> {
    backend: B,
    zone: String,
    target_port: u16,
}

impl<B: FirewallBackend> ForwardController<B> {
    pub fn new(backend: B, zone: &str, target_port: u16) -> Self {
        Self {
            backend,
            zone: zone.to_string(),
            target_port,
        }
    }

    pub fn from_config(backend: B, config: &FirewallConfig) -> Self {
        Self::new(backend, &config.zone, config.target_port)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn list_forwards(&self) -> Result<Vec<ForwardRule>, FirewallError> {
        let rules = self.backend.forward_ports(&self.zone)?;
        debug!("Zone {} has {} forward rule(s)", self.zone, rules.len());
        Ok(rules)
    }

    /// Forward external `port` to `toaddr` on the target port over TCP.
    pub fn add_forward(
        &mut self,
        port: &str,
        toaddr: &str,
        out: &mut dyn Write,
    ) -> Result<ForwardRule, ControllerError> {
        let rule = ForwardRule::new(
            port,
            FORWARD_PROTOCOL,
            &self.target_port.to_string(),
            toaddr,
        );
        self.backend.add_forward_port(&self.zone, &rule)?;
        info!("Added forward {rule} in zone {}", self.zone);
        writeln!(
            out,
            "Forwarded external port: {} to local address {}:{}",
            rule.port, rule.toaddr, rule.toport
        )?;
        Ok(rule)
    }

    pub fn remove_forward(
        &mut self,
        rule: &ForwardRule,
        out: &mut dyn Write,
    ) -> Result<(), ControllerError> {
        self.backend.remove_forward_port(&self.zone, rule)?;
        info!("Removed forward {rule} from zone {}", self.zone);
        writeln!(out, "{}", rule.removed_line())?;
        Ok(())
    }
}

/// Controller plus the last-fetched rule list.
///
/// The snapshot is only replaced by [`Session::refresh`].
pub struct Session<B> {
    controller: ForwardController<B>,
    snapshot: Vec<ForwardRule>,
}

impl<B: FirewallBackend> Session<B> {
    /// Open a session and take the initial snapshot.
    pub fn open(controller: ForwardController<B>) -> Result<Self, FirewallError> {
        let snapshot = controller.list_forwards()?;
        Ok(Self {
            controller,
            snapshot,
        })
    }

    pub fn controller(&self) -> &ForwardController<B> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ForwardController<B> {
        &mut self.controller
    }

    pub fn snapshot(&self) -> &[ForwardRule] {
        &self.snapshot
    }

    pub fn refresh(&mut self) -> Result<(), FirewallError> {
        self.snapshot = self.controller.list_forwards()?;
        Ok(())
    }

    /// Print the snapshot as a numbered table.
    pub fn print_snapshot(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for (i, rule) in self.snapshot.iter().enumerate() {
            writeln!(out, "{}", rule.table_row(i))?;
        }
        Ok(())
    }

    pub fn print_snapshot_json(&self, out: &mut dyn Write) -> Result<(), ControllerError> {
        serde_json::to_writer_pretty(&mut *out, &self.snapshot).map_err(std::io::Error::from)?;
        writeln!(out)?;
        Ok(())
    }

    /// Remove the rule at `index` of the current snapshot.
    ///
    /// Returns `Ok(false)` when the index is out of range.
    pub fn remove_at(&mut self, index: usize, out: &mut dyn Write) -> Result<bool, ControllerError> {
        let Some(rule) = self.snapshot.get(index).cloned() else {
            return Ok(false);
        };
        self.controller.remove_forward(&rule, out)?;
        Ok(true)
    }

    /// Remove every snapshot rule accepted by `matches`. Returns how many.
    pub fn remove_matching(
        &mut self,
        matches: impl Fn(&ForwardRule) -> bool,
        out: &mut dyn Write,
    ) -> Result<usize, ControllerError> {
        let targets: Vec<ForwardRule> = self.snapshot.iter().filter(|&r| matches(r)).cloned().collect();
        for rule in &targets {
            self.controller.remove_forward(rule, out)?;
        }
        Ok(targets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firewall::mock::MemoryFirewall;

    fn rdp(port: &str, addr: &str) -> ForwardRule {
        ForwardRule::new(port, "tcp", "3389", addr)
    }

    #[test]
    fn test_add_forward_targets_rdp_over_tcp() {
        let mut ctl = ForwardController::new(MemoryFirewall::default(), "external", 3389);
        let mut out = Vec::new();
        let rule = ctl.add_forward("2222", "192.168.2.5", &mut out).unwrap();

        assert_eq!(rule, rdp("2222", "192.168.2.5"));
        assert_eq!(
            ctl.backend().added,
            vec![("external".to_string(), rdp("2222", "192.168.2.5"))]
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Forwarded external port: 2222 to local address 192.168.2.5:3389\n"
        );
    }

    #[test]
    fn test_configured_target_port() {
        let config = FirewallConfig {
            zone: "dmz".into(),
            target_port: 3390,
            ..Default::default()
        };
        let mut ctl = ForwardController::from_config(MemoryFirewall::default(), &config);
        let mut out = Vec::new();
        ctl.add_forward("4000", "192.168.3.1", &mut out).unwrap();
        assert_eq!(ctl.backend().added[0].0, "dmz");
        assert_eq!(ctl.backend().added[0].1.toport, "3390");
    }

    #[test]
    fn test_empty_listing_prints_nothing() {
        let ctl = ForwardController::new(MemoryFirewall::default(), "external", 3389);
        let session = Session::open(ctl).unwrap();
        let mut out = Vec::new();
        session.print_snapshot(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_snapshot_is_not_refreshed_implicitly() {
        let backend = MemoryFirewall::with_rules(vec![rdp("2222", "192.168.2.5")]);
        let ctl = ForwardController::new(backend, "external", 3389);
        let mut session = Session::open(ctl).unwrap();
        let mut out = Vec::new();

        session
            .controller_mut()
            .add_forward("2223", "192.168.2.6", &mut out)
            .unwrap();
        assert_eq!(session.snapshot().len(), 1);

        session.refresh().unwrap();
        assert_eq!(session.snapshot().len(), 2);
    }

    #[test]
    fn test_remove_at_bounds() {
        let backend = MemoryFirewall::with_rules(vec![rdp("2222", "192.168.2.5")]);
        let mut session = Session::open(ForwardController::new(backend, "external", 3389)).unwrap();
        let mut out = Vec::new();

        assert!(!session.remove_at(1, &mut out).unwrap());
        assert!(session.controller().backend().removed.is_empty());

        assert!(session.remove_at(0, &mut out).unwrap());
        assert_eq!(session.controller().backend().removed.len(), 1);
        assert!(String::from_utf8(out)
            .unwrap()
            .starts_with("Removed forwarding FromPort: 2222 | ToPort: 3389"));
    }

    #[test]
    fn test_remove_matching_address() {
        let backend = MemoryFirewall::with_rules(vec![
            rdp("2222", "192.168.2.5"),
            rdp("2223", "192.168.2.6"),
            rdp("2224", "192.168.2.5"),
        ]);
        let mut session = Session::open(ForwardController::new(backend, "external", 3389)).unwrap();
        let mut out = Vec::new();

        let n = session
            .remove_matching(|r| r.toaddr == "192.168.2.5", &mut out)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(session.controller().backend().rules, vec![rdp("2223", "192.168.2.6")]);
    }

    #[test]
    fn test_print_snapshot_json() {
        let backend = MemoryFirewall::with_rules(vec![rdp("2222", "192.168.2.5")]);
        let session = Session::open(ForwardController::new(backend, "external", 3389)).unwrap();
        let mut out = Vec::new();
        session.print_snapshot_json(&mut out).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["port"], "2222");
        assert_eq!(parsed[0]["toaddr"], "192.168.2.5");
        assert_eq!(parsed[0]["protocol"], "tcp");
    }
}
