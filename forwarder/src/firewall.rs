//! Firewall service backend
//!
//! The firewall daemon owns every rule. [`FirewallBackend`] is the seam over
//! its control interface; [`FirewallCmd`] talks to firewalld through
//! `firewall-cmd`, one blocking subprocess per call.

use std::process::{Command, ExitStatus};
use tracing::{debug, warn};

use crate::config::FirewallConfig;
use crate::rule::ForwardRule;

/// Failures reaching or using the firewall service.
#[derive(Debug, thiserror::Error)]
pub enum FirewallError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} {action} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        action: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} produced non-UTF-8 output")]
    Utf8 { program: String },
}

/// Control operations the firewall service must provide.
pub trait FirewallBackend {
    /// Current forward rules for `zone`, in service order.
    fn forward_ports(&self, zone: &str) -> Result<Vec<ForwardRule>, FirewallError>;

    fn add_forward_port(&mut self, zone: &str, rule: &ForwardRule) -> Result<(), FirewallError>;

    fn remove_forward_port(&mut self, zone: &str, rule: &ForwardRule) -> Result<(), FirewallError>;
}

/// firewalld via its command-line front end.
#[derive(Debug, Clone)]
pub struct FirewallCmd {
    program: String,
    permanent: bool,
}

impl FirewallCmd {
    pub fn new(program: &str, permanent: bool) -> Self {
        Self {
            program: program.to_string(),
            permanent,
        }
    }

    pub fn from_config(config: &FirewallConfig) -> Self {
        Self::new(&config.command, config.permanent)
    }

    /// Arguments for one invocation: optional `--permanent`, the zone, then `op`.
    fn args(&self, zone: &str, op: String) -> Vec<String> {
        let mut args = Vec::with_capacity(3);
        if self.permanent {
            args.push("--permanent".to_string());
        }
        args.push(format!("--zone={zone}"));
        args.push(op);
        args
    }

    fn run(&self, action: &'static str, args: &[String]) -> Result<String, FirewallError> {
        debug!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| FirewallError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FirewallError::CommandFailed {
                program: self.program.clone(),
                action,
                status: output.status,
                stderr: stderr.trim().to_string(),
            });
        }

        // firewall-cmd reports ALREADY_ENABLED / NOT_ENABLED as warnings with
        // a zero exit status.
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!("{} {action}: {}", self.program, stderr.trim());
        }

        String::from_utf8(output.stdout).map_err(|_| FirewallError::Utf8 {
            program: self.program.clone(),
        })
    }
}

impl FirewallBackend for FirewallCmd {
    fn forward_ports(&self, zone: &str) -> Result<Vec<ForwardRule>, FirewallError> {
        let args = self.args(zone, "--list-forward-ports".to_string());
        let stdout = self.run("list", &args)?;
        Ok(parse_listing(&stdout))
    }

    fn add_forward_port(&mut self, zone: &str, rule: &ForwardRule) -> Result<(), FirewallError> {
        let args = self.args(zone, format!("--add-forward-port={rule}"));
        self.run("add", &args).map(|_| ())
    }

    fn remove_forward_port(&mut self, zone: &str, rule: &ForwardRule) -> Result<(), FirewallError> {
        let args = self.args(zone, format!("--remove-forward-port={rule}"));
        self.run("remove", &args).map(|_| ())
    }
}

/// Parse `--list-forward-ports` output, skipping lines that are not rules.
pub fn parse_listing(stdout: &str) -> Vec<ForwardRule> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match line.parse::<ForwardRule>() {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!("Skipping {e}");
                None
            }
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_skips_noise() {
        let out = "port=2222:proto=tcp:toport=3389:toaddr=192.168.2.5\n\
                   \n\
                   port=2223:proto=tcp:toport=3389:toaddr=192.168.3.17\n\
                   something unexpected\n";
        let rules = parse_listing(out);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].port, "2222");
        assert_eq!(rules[1].toaddr, "192.168.3.17");
    }

    #[test]
    fn test_parse_listing_empty() {
        assert!(parse_listing("").is_empty());
        assert!(parse_listing("\n").is_empty());
    }

    #[test]
    fn test_args_runtime_and_permanent() {
        let rule = ForwardRule::new("2222", "tcp", "3389", "192.168.2.5");

        let runtime = FirewallCmd::new("firewall-cmd", false);
        assert_eq!(
            runtime.args("external", format!("--add-forward-port={rule}")),
            vec![
                "--zone=external".to_string(),
                "--add-forward-port=port=2222:proto=tcp:toport=3389:toaddr=192.168.2.5".to_string(),
            ]
        );

        let permanent = FirewallCmd::new("firewall-cmd", true);
        let args = permanent.args("external", "--list-forward-ports".to_string());
        assert_eq!(args[0], "--permanent");
        assert_eq!(args[1], "--zone=external");
        assert_eq!(args[2], "--list-forward-ports");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let fw = FirewallCmd::new("/nonexistent/rdpfwd-firewall-cmd", false);
        let err = fw.forward_ports("external").unwrap_err();
        assert!(matches!(err, FirewallError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_command_failed() {
        let mut fw = FirewallCmd::new("false", false);
        let rule = ForwardRule::new("2222", "tcp", "3389", "192.168.2.5");
        let err = fw.add_forward_port("external", &rule).unwrap_err();
        match err {
            FirewallError::CommandFailed { action, .. } => assert_eq!(action, "add"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_success_lists_nothing() {
        let fw = FirewallCmd::new("true", false);
        assert!(fw.forward_ports("external").unwrap().is_empty());
    }
}
