use anyhow::Context;
use indexer_gateway::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), anyhow::Error> {
    let openapi_spec = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;
    let output_path = "openapi.json";
    std::fs::write(output_path, openapi_spec).context("Failed to write OpenAPI document to file")?;

    println!("OpenAPI document written to {output_path}");
    Ok(())
}
