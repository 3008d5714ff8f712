use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "jobsctl")]
#[command(about = "Run demo jobs in-process and watch their progress")]
pub struct Cli {
    /// Milliseconds between progress polls
    #[arg(long, global = true, default_value_t = 500)]
    pub poll_ms: u64,

    /// Number of queue runners
    #[arg(long, global = true, default_value_t = 2)]
    pub concurrency: u32,

    /// Delete the job record once it completes successfully
    #[arg(long, global = true)]
    pub simple: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a fake job that counts for <seconds> seconds
    Fake {
        seconds: u64,

        /// Milliseconds per counted second
        #[arg(long, default_value_t = 1000)]
        tick_ms: u64,
    },
    /// Import <rows> generated rows into an in-memory table
    DemoImport {
        rows: usize,

        /// Rows per chunk
        #[arg(long, default_value_t = 20)]
        chunk: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fake_with_global_flags() {
        let cli = Cli::parse_from(["jobsctl", "fake", "5", "--simple", "--tick-ms", "10"]);
        assert!(cli.simple);
        assert_eq!(cli.poll_ms, 500);
        assert!(matches!(cli.command, Command::Fake { seconds: 5, tick_ms: 10 }));
    }

    #[test]
    fn parses_demo_import() {
        let cli = Cli::parse_from(["jobsctl", "--concurrency", "1", "demo-import", "90", "--chunk", "30"]);
        assert_eq!(cli.concurrency, 1);
        assert!(matches!(cli.command, Command::DemoImport { rows: 90, chunk: 30 }));
    }
}
