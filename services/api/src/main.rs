use mentor_match_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("mentor-match failed: {err}");
        std::process::exit(err.exit_code());
    }
}
