use std::error::Error;

#[rocket::main]
async fn main() -> Result<(), Box<dyn Error>> {
    portal::build(rocket::Config::figment())?.launch().await?;

    Ok(())
}
