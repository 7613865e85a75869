use crate::core::Utxo;
use crate::error::Result;
use crate::storage::SharedState;
use crate::utils::Shutdown;
use log::{info, warn};
use std::fmt::Write as _;
use std::io::{BufRead, Write};

const HELP: &str = "Commands:
  chain        print every block
  pool         print pending records
  send <to>    create a record from this node to <to>
  validate     validate the whole chain
  status       chain height, pool size and difficulties
  help         show this message
  quit         stop the node";

/// What the console loop should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Output(String),
    Quit,
}

/// Line-oriented operator console over the shared node state
pub struct Console {
    state: SharedState,
    signature: String,
    shutdown: Shutdown,
}

impl Console {
    pub fn new(state: SharedState, signature: &str, shutdown: Shutdown) -> Console {
        Console {
            state,
            signature: signature.to_string(),
            shutdown,
        }
    }

    /// Read commands from `input` until `quit`, end of input or shutdown
    pub fn run(&self, input: impl BufRead, mut output: impl Write) -> Result<()> {
        writeln!(output, "{HELP}")?;
        for line in input.lines() {
            if self.shutdown.is_triggered() {
                break;
            }
            let line = line?;
            match self.execute(&line) {
                Ok(Reply::Output(text)) => {
                    if !text.is_empty() {
                        writeln!(output, "{text}")?;
                    }
                }
                Ok(Reply::Quit) => {
                    info!("Quit requested from console");
                    self.shutdown.trigger();
                    break;
                }
                Err(e) => {
                    warn!("Command '{}' failed: {e}", line.trim());
                    writeln!(output, "error: {e}")?;
                }
            }
            output.flush()?;
        }
        Ok(())
    }

    pub fn execute(&self, line: &str) -> Result<Reply> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Reply::Output(String::new()));
        };

        let text = match command {
            "chain" => self.print_chain()?,
            "pool" => self.print_pool()?,
            "send" => match words.next() {
                Some(to) => self.send(to)?,
                None => "usage: send <to>".to_string(),
            },
            "validate" => self.validate()?,
            "status" => self.status()?,
            "help" => HELP.to_string(),
            "quit" | "exit" => return Ok(Reply::Quit),
            other => format!("unknown command '{other}', try 'help'"),
        };
        Ok(Reply::Output(text))
    }

    fn print_chain(&self) -> Result<String> {
        let state = self.state.lock()?;
        let mut text = String::new();
        for block in state.chain.get_blocks() {
            let _ = writeln!(
                text,
                "#{} {} prev={} pow={} pows={} solution={}{} records={} by {}",
                block.get_index(),
                block.get_hash_hex(),
                data_encoding::HEXLOWER.encode(block.get_prev_hash()),
                block.get_pow_difficulty(),
                block.get_pows_difficulty(),
                block.get_solution_candidate(),
                if block.is_solution_block() { "*" } else { "" },
                block.get_txos().len(),
                block.get_signature()
            );
        }
        Ok(text.trim_end().to_string())
    }

    fn print_pool(&self) -> Result<String> {
        let state = self.state.lock()?;
        if state.pool.is_empty() {
            return Ok("pool is empty".to_string());
        }
        let mut text = String::new();
        for record in state.pool.get_all().values() {
            let _ = writeln!(
                text,
                "{} {} -> {} amount={} fee={}",
                record.get_id(),
                record.get_from(),
                record.get_to(),
                record.get_amount(),
                record.get_fee()
            );
        }
        Ok(text.trim_end().to_string())
    }

    fn send(&self, to: &str) -> Result<String> {
        let record = Utxo::new(&self.signature, to)?;
        let id = self.state.submit_record(record)?;
        Ok(format!("pending record {id}"))
    }

    fn validate(&self) -> Result<String> {
        let state = self.state.lock()?;
        Ok(match state.chain.is_valid() {
            Ok(()) => format!("chain of {} blocks is valid", state.chain.len()),
            Err(e) => format!("chain is invalid: {e}"),
        })
    }

    fn status(&self) -> Result<String> {
        let state = self.state.lock()?;
        let next = state.chain.next_difficulties()?;
        Ok(format!(
            "height {} | tip {} | pool {} | best solution {} | next pow {} pows {}",
            state.chain.get_best_height(),
            state.chain.get_tip().get_hash_hex(),
            state.pool.len(),
            state.chain.get_best_solution(),
            next.pow,
            next.pows
        ))
    }
}
