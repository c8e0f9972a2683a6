use crate::error::Result;
use crate::habitat::Habitat;
use crate::launch::show_system_explorer;
use std::path::Path;

pub struct ExploreCommand<'a> {
    habitat: &'a Habitat,
}

impl<'a> ExploreCommand<'a> {
    pub fn new(habitat: &'a Habitat) -> Result<Self> {
        Ok(Self { habitat })
    }

    pub fn execute(&self, path: Option<&Path>) -> Result<()> {
        show_system_explorer(self.habitat, path)
    }
}
