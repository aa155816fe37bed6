use serde::Serialize;

/// A waste category the classifier can predict, paired with its disposal advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WasteCategory {
    pub label: &'static str,
    pub instruction: &'static str,
}

/// Categories in the classifier's output order: the predicted class index is
/// the position in this table.
pub const CATEGORIES: [WasteCategory; 6] = [
    WasteCategory {
        label: "Пластик",
        instruction: "Промыть и сдать в контейнер для пластика",
    },
    WasteCategory {
        label: "Бумага",
        instruction: "Сдать в контейнер для макулатуры",
    },
    WasteCategory {
        label: "Стекло",
        instruction: "Сдать в контейнер для стекла или пункт приёма стеклотары",
    },
    WasteCategory {
        label: "Металл",
        instruction: "Сдать в контейнер для металла",
    },
    WasteCategory {
        label: "Органика",
        instruction: "Компостирование",
    },
    WasteCategory {
        label: "Опасные отходы",
        instruction: "Специализированный пункт (батарейки, лампы)",
    },
];

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub instruction: &'static str,
}

impl From<&WasteCategory> for PredictionResponse {
    fn from(category: &WasteCategory) -> Self {
        Self {
            kind: category.label,
            instruction: category.instruction,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_category_has_advice() {
        for category in CATEGORIES.iter() {
            assert!(!category.label.is_empty());
            assert!(!category.instruction.trim().is_empty(), "{}", category.label);
        }
    }

    #[test]
    fn labels_are_unique() {
        let labels: HashSet<_> = CATEGORIES.iter().map(|c| c.label).collect();
        assert_eq!(labels.len(), CATEGORIES.len());
    }

    #[test]
    fn response_uses_type_key() {
        let body = serde_json::to_value(PredictionResponse::from(&CATEGORIES[0])).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "type": "Пластик",
                "instruction": "Промыть и сдать в контейнер для пластика",
            })
        );
    }
}
