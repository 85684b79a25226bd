//! Command-line surface and flag-mode dispatch

use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::info;

use crate::controller::{ControllerError, Session};
use crate::firewall::FirewallBackend;
use crate::shell::Shell;
use crate::validate::{self, ValidationError};

#[derive(Parser, Debug, Default)]
#[command(
    name = "rdpfwd",
    version,
    about = "Manage firewalld port forwards to remote desktop hosts",
    after_help = "EXAMPLES:\n  List forwards:            rdpfwd -v\n  Forward 2222 to a host:   rdpfwd -a 2222 192.168.2.5\n  Drop forwards to a host:  rdpfwd -D 192.168.2.5\n  Interactive mode:         rdpfwd -i"
)]
pub struct Cli {
    #[arg(short = 'd', long, value_name = "PORT", help = "Delete forwards from this external port")]
    pub delport: Option<String>,

    #[arg(short = 'D', long, value_name = "ADDR", help = "Delete forwards to this local address")]
    pub deladdr: Option<String>,

    #[arg(
        short = 'a',
        long,
        num_args = 2,
        value_names = ["PORT", "ADDR"],
        help = "Forward external PORT to ADDR on the RDP port"
    )]
    pub addport: Option<Vec<String>>,

    #[arg(short = 'v', long, help = "View forwarded ports")]
    pub view: bool,

    #[arg(short = 'j', long, requires = "view", help = "Print the --view listing as JSON")]
    pub json: bool,

    #[arg(short = 'i', long, help = "Interactive mode")]
    pub interactive: bool,

    #[arg(short = 'c', long, value_name = "FILE", help = "Configuration file [default: /etc/rdpfwd/config.toml]")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Whether this invocation may change firewall state.
    pub fn mutates(&self) -> bool {
        self.delport.is_some() || self.deladdr.is_some() || self.addport.is_some() || self.interactive
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Process every flag that is present, in a fixed order, against one
/// session. The first validation failure stops processing.
pub fn execute<B, R, W>(
    cli: &Cli,
    session: &mut Session<B>,
    input: R,
    mut out: W,
) -> Result<(), RunError>
where
    B: FirewallBackend,
    R: BufRead,
    W: Write,
{
    if cli.view {
        if cli.json {
            session.print_snapshot_json(&mut out)?;
        } else {
            session.print_snapshot(&mut out).map_err(ControllerError::from)?;
        }
    }

    // Each mutating flag refetches, so later flags and the shell see the
    // rules as they are now.
    if let Some(addr) = &cli.deladdr {
        validate::check_address(addr)?;
        let n = session.remove_matching(|r| &r.toaddr == addr, &mut out)?;
        info!("Removed {n} forward(s) to {addr}");
        session.refresh().map_err(ControllerError::from)?;
    }

    if let Some(port) = &cli.delport {
        validate::check_port(port)?;
        let port = port.trim();
        let n = session.remove_matching(|r| r.port == port, &mut out)?;
        info!("Removed {n} forward(s) from port {port}");
        session.refresh().map_err(ControllerError::from)?;
    }

    if let Some([port, toaddr]) = cli.addport.as_deref() {
        validate::check_new_port(port)?;
        validate::check_address(toaddr)?;
        session
            .controller_mut()
            .add_forward(port.trim(), toaddr, &mut out)?;
        session.refresh().map_err(ControllerError::from)?;
    }

    if cli.interactive {
        Shell::new(session, input, &mut out).run()?;
    }

    out.flush().map_err(ControllerError::from)?;
    Ok(())
}
