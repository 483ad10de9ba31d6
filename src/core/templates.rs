use crate::error::BoardResult;
use minijinja::{Environment, Template};
use once_cell::sync::Lazy;
use strum::{EnumIter, IntoEnumIterator};
use tracing::info;

static TEMPLATES_ENVIRONMENT: Lazy<Environment> = Lazy::new(|| {
    info!("Initializing templating engine environment.");
    let mut env = Environment::new();

    // Use strum to iterate over the variants of the enum.
    for template in MessageTemplate::iter() {
        env.add_template(template.name(), template.template())
            .unwrap();
    }

    info!("Templates loaded in templating engine environment.");

    env
});

#[derive(EnumIter)]
pub enum MessageTemplate {
    Header,
    Standing,
}

impl MessageTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            MessageTemplate::Header => "header.txt",
            MessageTemplate::Standing => "standing.txt",
        }
    }

    pub fn get(&self) -> BoardResult<Template<'_, '_>> {
        Ok(TEMPLATES_ENVIRONMENT.get_template(self.name())?)
    }

    pub fn template(&self) -> &'static str {
        match self {
            MessageTemplate::Header => "🏆 {{ page_title }} (as of {{ timestamp }})",
            MessageTemplate::Standing => {
                "📊 {{ title }}\n\
                {%- if standings %}\n{{ standings }}\
                {%- else %}\n    (no entries yet)\
                {%- endif %}"
            }
        }
    }
}
