mod list;
mod show;

use anyhow::Result;
use bpaf::Bpaf;
use tracing::debug;

use crate::config::Config;

const POKEDEX_DESCRIPTION: &str = "Browse the creature catalog from the terminal";

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, descr(POKEDEX_DESCRIPTION))]
pub struct PokedexCli(#[bpaf(external(pokedex_args))] pub PokedexArgs);

/// Main pokedex args parser
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)]
pub struct PokedexArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    #[bpaf(external(commands))]
    command: Commands,
}

impl PokedexArgs {
    pub async fn handle(self, config: Config) -> Result<()> {
        debug!(command = ?self.command, "running command");
        match self.command {
            Commands::List(args) => args.handle(config).await,
            Commands::Show(args) => args.handle(config).await,
        }
    }
}

#[derive(Debug, Bpaf, Clone)]
enum Commands {
    /// List catalog entries with their types and images
    #[bpaf(command)]
    List(#[bpaf(external(list::list))] list::List),

    /// Show the details and description of one entry
    #[bpaf(command)]
    Show(#[bpaf(external(show::show))] show::Show),
}
