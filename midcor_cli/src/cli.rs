use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q: warn, -qq: error)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Correct a measurements file for natural abundance and tracer purity.
    Correct(CorrectArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct CorrectArgs {
    /// The measurements file to process (TSV with columns
    /// sample/metabolite/derivative/area/isotopologue).
    pub measurements: PathBuf,

    /// The isotopic tracer, e.g. "13C".
    #[arg(short, long)]
    pub tracer: String,

    /// Path to the metabolites database. When omitted, the metabolite
    /// column of the measurements file is read as an elemental formula.
    #[arg(short = 'M', long)]
    pub metabolites_db: Option<PathBuf>,

    /// Path to the derivatives database. When omitted, the derivative
    /// column of the measurements file is read as an elemental formula.
    #[arg(short = 'D', long)]
    pub derivatives_db: Option<PathBuf>,

    /// Path to the isotopes file. When omitted, built-in natural
    /// abundances are used.
    #[arg(short = 'I', long)]
    pub isotopes_db: Option<PathBuf>,

    /// Purity vector of the tracer, e.g. "0.01,0.99". Defaults to a
    /// perfect purity.
    #[arg(short, long, value_delimiter = ',')]
    pub purity: Option<Vec<f64>>,

    /// Correct the natural abundance of the tracer element itself.
    #[arg(short = 'n', long)]
    pub correct_na_tracer: bool,

    /// Skip the mean enrichment column.
    #[arg(long)]
    pub no_mean_enrichment: bool,

    /// Where to write the corrected TSV (stdout when omitted).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
