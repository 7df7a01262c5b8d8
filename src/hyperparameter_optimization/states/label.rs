use indexmap::IndexMap;

use super::item::HPItem;
use super::selection::HPSelectionState;
use crate::data::Label;
use crate::hyperparameter_optimization::HPSetting;

/// Per-label record of one outer split
#[derive(Clone, Debug)]
pub struct HPLabelState {
    pub label: Label,
    /// Setting chosen by the inner loop
    pub optimal_hp_setting: Option<HPSetting>,
    pub selection_state: HPSelectionState,
    /// Retrained-and-assessed item per setting, in declaration order
    pub assessment_items: IndexMap<HPSetting, HPItem>,
}

impl HPLabelState {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            optimal_hp_setting: None,
            selection_state: HPSelectionState::default(),
            assessment_items: IndexMap::new(),
        }
    }

    /// Assessment item of the optimal setting
    pub fn optimal_assessment_item(&self) -> Option<&HPItem> {
        self.optimal_hp_setting.as_ref().and_then(|s| self.assessment_items.get(s))
    }

    /// Assessment item looked up by setting key (e.g. `enc_ml`)
    pub fn assessment_item_by_key(&self, key: &str) -> Option<&HPItem> {
        self.assessment_items.iter().find(|(s, _)| s.key() == key).map(|(_, item)| item)
    }
}
