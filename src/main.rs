use clap::Parser;
use tbm_dashboard::dash_controllers::{Cli, DashControllers};

fn main() {
    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ APPLICATION PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\n{}", panic_info);
        eprintln!("\n💡 Check the extract paths and the dashboard config, then retry.");
        eprintln!("\n{}", "═".repeat(70));
    }));

    // .env may provide TBM_STATIONS_CSV, TBM_NETWORK_CSV and TBM_DASH_CONFIG
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = DashControllers::run(cli) {
        eprintln!("\n✗ {:#}", e);
        std::process::exit(1);
    }
}
