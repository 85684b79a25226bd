//! Interactive shell — a synchronous read, prompt, dispatch loop
//!
//! ```text
//! MainMenu --d--> DeleteMenu --q / removed--> MainMenu
//! MainMenu --q / EOF--> Terminated
//! ```

use std::io::{BufRead, Write};
use tracing::debug;

use crate::controller::{ControllerError, Session};
use crate::firewall::FirewallBackend;
use crate::validate;

const MAIN_PROMPT: &str = "Choose the action - (a)dd/(d)elete/(v)iew/(q)uit:";
const DELETE_PROMPT: &str = "Choose which of above to delete (enter number, (v)iew or (q)uit):";
const PORT_PROMPT: &str = "External port: ";
const ADDRESS_PROMPT: &str = "Local ip: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    MainMenu,
    DeleteMenu,
    Terminated,
}

pub struct Shell<'a, B, R, W> {
    session: &'a mut Session<B>,
    input: R,
    out: W,
    state: ShellState,
}

impl<'a, B, R, W> Shell<'a, B, R, W>
where
    B: FirewallBackend,
    R: BufRead,
    W: Write,
{
    pub fn new(session: &'a mut Session<B>, input: R, out: W) -> Self {
        Self {
            session,
            input,
            out,
            state: ShellState::MainMenu,
        }
    }

    /// Show the current rules, then loop until the operator quits or input ends.
    ///
    /// Firewall failures are not handled here and end the loop.
    pub fn run(mut self) -> Result<(), ControllerError> {
        self.session.print_snapshot(&mut self.out)?;
        while self.state != ShellState::Terminated {
            self.state = match self.state {
                ShellState::MainMenu => self.main_menu()?,
                ShellState::DeleteMenu => self.delete_menu()?,
                ShellState::Terminated => ShellState::Terminated,
            };
        }
        self.out.flush()?;
        Ok(())
    }

    /// Print `prompt` and read one trimmed line; `None` at end of input.
    fn prompt(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn main_menu(&mut self) -> Result<ShellState, ControllerError> {
        let Some(choice) = self.prompt(MAIN_PROMPT)? else {
            return Ok(ShellState::Terminated);
        };
        debug!("Main menu choice: {choice:?}");

        match choice.as_str() {
            "q" => Ok(ShellState::Terminated),
            "v" => {
                self.session.refresh()?;
                self.session.print_snapshot(&mut self.out)?;
                Ok(ShellState::MainMenu)
            }
            "a" => self.add(),
            "d" => Ok(ShellState::DeleteMenu),
            _ => Ok(ShellState::MainMenu),
        }
    }

    fn add(&mut self) -> Result<ShellState, ControllerError> {
        let Some(port) = self.prompt(PORT_PROMPT)? else {
            return Ok(ShellState::Terminated);
        };
        if let Err(e) = validate::check_new_port(&port) {
            writeln!(self.out, "{e}")?;
            return Ok(ShellState::MainMenu);
        }

        let Some(toaddr) = self.prompt(ADDRESS_PROMPT)? else {
            return Ok(ShellState::Terminated);
        };
        if let Err(e) = validate::check_address(&toaddr) {
            writeln!(self.out, "{e}")?;
            return Ok(ShellState::MainMenu);
        }

        self.session
            .controller_mut()
            .add_forward(&port, &toaddr, &mut self.out)?;
        self.session.refresh()?;
        Ok(ShellState::MainMenu)
    }

    fn delete_menu(&mut self) -> Result<ShellState, ControllerError> {
        let Some(choice) = self.prompt(DELETE_PROMPT)? else {
            return Ok(ShellState::Terminated);
        };

        match choice.as_str() {
            "q" => Ok(ShellState::MainMenu),
            "v" => {
                self.session.print_snapshot(&mut self.out)?;
                Ok(ShellState::DeleteMenu)
            }
            other => {
                let Ok(index) = other.parse::<usize>() else {
                    return Ok(ShellState::DeleteMenu);
                };
                if self.session.remove_at(index, &mut self.out)? {
                    self.session.refresh()?;
                    Ok(ShellState::MainMenu)
                } else {
                    debug!("Index {index} outside snapshot of {}", self.session.snapshot().len());
                    Ok(ShellState::DeleteMenu)
                }
            }
        }
    }
}
