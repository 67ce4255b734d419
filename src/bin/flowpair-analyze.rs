use clap::Parser;
use flowpair::analysis::{self, MissingStore};
use flowpair::config::AnalyzerArgs;
use flowpair::logging;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = AnalyzerArgs::parse();
    let _guard = match logging::init_logging(None, args.log_level()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let config = args.into_config();
    let mut out = BufWriter::new(io::stdout().lock());
    let result = analysis::run(&config, &mut out).and_then(|report| {
        out.flush()?;
        Ok(report)
    });

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<MissingStore>() {
                Some(missing) => eprintln!("{missing}"),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
