#[tokio::main]
async fn main() {
    allercare_lib::init_tracing();

    if let Err(e) = allercare_lib::run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
