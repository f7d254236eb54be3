use std::process::ExitCode;

use lumen_app::{App, AppArgs, load_cvars};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    lumen_app::init();

    let args = AppArgs::parse();

    if args.list_cvars {
        return match load_cvars(&args).and_then(|cvars| Ok(cvars.to_toml_string()?)) {
            Ok(toml) => {
                print!("{toml}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                log::error!("{err}");
                ExitCode::FAILURE
            }
        };
    }

    match App::new(args).and_then(App::run) {
        Ok(stats) => {
            if let Some(path) = &stats.screenshot {
                println!("Screenshot: {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
