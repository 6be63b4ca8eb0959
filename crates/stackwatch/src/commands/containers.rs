//! Container listing for one stack.

use stackwatch_core::{ContainerInfo, Controller};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Ports")]
    ports: String,
}

impl From<&ContainerInfo> for ContainerRow {
    fn from(c: &ContainerInfo) -> Self {
        Self {
            service: c.service.clone(),
            name: c.name.clone(),
            state: c.state.clone(),
            health: c.health.clone(),
            image: c.image.clone(),
            ports: c.ports.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(
    controller: &Controller,
    path: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let containers = controller.list_containers(path).await?;
    let out = output::render_list(
        &global.output,
        &containers,
        |c| ContainerRow::from(c),
        |c| c.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
