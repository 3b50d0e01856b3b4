//! School Site Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() -> std::io::Result<()> {
    school_site_backend::run().await
}
