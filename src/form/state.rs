use crate::assets::decode::ImageSource;
use crate::foundation::core::Side;
use crate::foundation::error::{DiptychError, DiptychResult};

pub const DEFAULT_FILE_NAME: &str = "before-v-after";
pub const DEFAULT_BEFORE_LABEL: &str = "before";
pub const DEFAULT_AFTER_LABEL: &str = "after";

/// Per-side form slots: the chosen image and the overlay label.
///
/// At most one image and one label are live per side; the latest assignment
/// wins and there is no history.
#[derive(Clone, Debug, Default)]
pub struct SideSlot {
    pub image: Option<ImageSource>,
    pub label: Option<String>,
}

/// Mutable record of the two sides' inputs plus the output file name.
///
/// Lives for the whole session: initialized with placeholder labels and a
/// default output name, mutated in place by the session's input surface,
/// read by the compositor. Never destroyed, only overwritten.
#[derive(Clone, Debug)]
pub struct FormState {
    file_name: String,
    slots: [SideSlot; 2],
}

impl Default for FormState {
    fn default() -> Self {
        Self::new()
    }
}

impl FormState {
    pub fn new() -> Self {
        Self {
            file_name: DEFAULT_FILE_NAME.to_string(),
            slots: [
                SideSlot {
                    image: None,
                    label: Some(DEFAULT_BEFORE_LABEL.to_string()),
                },
                SideSlot {
                    image: None,
                    label: Some(DEFAULT_AFTER_LABEL.to_string()),
                },
            ],
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = name.into();
    }

    /// The download name the exported PNG should be saved under.
    pub fn export_file_name(&self) -> String {
        format!("{}.png", self.file_name)
    }

    pub fn slot(&self, side: Side) -> &SideSlot {
        &self.slots[side.index()]
    }

    pub fn set_image(&mut self, side: Side, source: ImageSource) {
        self.slots[side.index()].image = Some(source);
    }

    /// Store the raw label value. Empty strings are kept (the renderer skips
    /// them), matching a text field cleared by the user.
    pub fn set_label(&mut self, side: Side, label: impl Into<String>) {
        self.slots[side.index()].label = Some(label.into());
    }

    /// True once the output name and both image slots are populated; the
    /// collaborator gates export on this.
    pub fn is_complete(&self) -> bool {
        !self.file_name.is_empty() && self.slots.iter().all(|s| s.image.is_some())
    }
}

/// Resolve a file-picker selection to exactly one source.
///
/// A selection event must carry exactly one image; zero or several are a
/// caller error and leave any form state untouched.
pub fn single_selection(mut selection: Vec<ImageSource>) -> DiptychResult<ImageSource> {
    if selection.len() > 1 {
        return Err(DiptychError::input_cardinality(format!(
            "{} image sources supplied for a single slot",
            selection.len()
        )));
    }
    selection
        .pop()
        .ok_or_else(|| DiptychError::input_cardinality("no image source supplied"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_initial_form() {
        let form = FormState::new();
        assert_eq!(form.file_name(), "before-v-after");
        assert_eq!(form.slot(Side::Before).label.as_deref(), Some("before"));
        assert_eq!(form.slot(Side::After).label.as_deref(), Some("after"));
        assert!(form.slot(Side::Before).image.is_none());
        assert!(form.slot(Side::After).image.is_none());
        assert!(!form.is_complete());
    }

    #[test]
    fn latest_assignment_wins() {
        let mut form = FormState::new();
        form.set_label(Side::Before, "first");
        form.set_label(Side::Before, "second");
        assert_eq!(form.slot(Side::Before).label.as_deref(), Some("second"));
        assert_eq!(form.slot(Side::After).label.as_deref(), Some("after"));
    }

    #[test]
    fn complete_needs_both_images_and_a_name() {
        let mut form = FormState::new();
        form.set_image(Side::Before, ImageSource::memory(vec![1u8]));
        assert!(!form.is_complete());
        form.set_image(Side::After, ImageSource::memory(vec![2u8]));
        assert!(form.is_complete());
        form.set_file_name("");
        assert!(!form.is_complete());
    }

    #[test]
    fn export_file_name_appends_png() {
        let mut form = FormState::new();
        form.set_file_name("shot");
        assert_eq!(form.export_file_name(), "shot.png");
    }

    #[test]
    fn selection_must_have_exactly_one_source() {
        assert!(matches!(
            single_selection(Vec::new()),
            Err(DiptychError::InputCardinality(_))
        ));
        assert!(matches!(
            single_selection(vec![
                ImageSource::memory(vec![1u8]),
                ImageSource::memory(vec![2u8]),
            ]),
            Err(DiptychError::InputCardinality(_))
        ));
        assert!(single_selection(vec![ImageSource::memory(vec![1u8])]).is_ok());
    }
}
