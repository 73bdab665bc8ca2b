use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
	reloader::run().await
}
