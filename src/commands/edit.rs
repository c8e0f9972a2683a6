use crate::error::Result;
use crate::habitat::Habitat;
use crate::launch::edit_text_file;
use std::path::Path;

pub struct EditCommand<'a> {
    habitat: &'a Habitat,
}

impl<'a> EditCommand<'a> {
    pub fn new(habitat: &'a Habitat) -> Result<Self> {
        Ok(Self { habitat })
    }

    pub fn execute(&self, file: &Path, background: Option<bool>) -> Result<()> {
        edit_text_file(self.habitat, file, background)
    }
}
