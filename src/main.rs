use clap::Parser;
use tenantgate::cli::{
    Args, build_config, handle_activation_flags, handle_create_admin, init_logging, load_secrets,
    open_database,
};
use tenantgate::{init_cleanup, run_server};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(secrets) = load_secrets(
        args.access_secret_file.as_deref(),
        args.refresh_secret_file.as_deref(),
    ) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some(email) = args.create_admin.as_deref() {
        handle_create_admin(&db, email, args.tenant_name.as_deref()).await;
    }

    handle_activation_flags(&db, &args).await;

    if args.insecure_cookies {
        warn!("Cookies are sent without the Secure flag");
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to get local address");
        std::process::exit(1);
    });

    let config = build_config(&args, db, secrets);
    init_cleanup(&config).await;

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
