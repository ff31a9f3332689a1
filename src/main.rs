use aurora_bridge::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    aurora_bridge::app(Options::new()).await
}
