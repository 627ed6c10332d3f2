//! Character sheets: the saved document, the local editor that pairs it with
//! the trait registry, and the room's roster of other players' sheets.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ClientError;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::traits::{TraitRegistry, TraitSnapshot, ARCHETYPE_ID};

/// Saved as a whole, loaded as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub motivation: String,
    #[serde(default, deserialize_with = "nullable")]
    pub archetype: String,
    /// `data:<mime>;base64,<payload>` or empty
    #[serde(default, deserialize_with = "nullable")]
    pub photo: String,
    #[serde(flatten)]
    pub traits: TraitSnapshot,
    #[serde(default, deserialize_with = "text_list")]
    pub misfortunes: Vec<String>,
    #[serde(default, deserialize_with = "text_list")]
    pub lessons: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub resources: String,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: String,
}

fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

// Older sheets hold arbitrary JSON in these lists
fn text_list<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetField {
    Name,
    Motivation,
    Resources,
    Notes,
}

impl CharacterSheet {
    pub fn set_field(&mut self, field: SheetField, value: String) {
        match field {
            SheetField::Name => self.name = value,
            SheetField::Motivation => self.motivation = value,
            SheetField::Resources => self.resources = value,
            SheetField::Notes => self.notes = value,
        }
    }

    /// SHA-256 over the serialized sheet; equal sheets, equal fingerprints
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    pub fn set_photo(&mut self, bytes: &[u8], mime: &str) {
        self.photo = format!("data:{};base64,{}", mime, STANDARD.encode(bytes));
    }

    pub fn clear_photo(&mut self) {
        self.photo.clear();
    }

    /// Decoded photo payload; None when absent or not a base64 data URL
    pub fn photo_bytes(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.photo.strip_prefix("data:")?.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }

    pub fn photo_mime(&self) -> Option<&str> {
        let (mime, _) = self.photo.strip_prefix("data:")?.split_once(";base64,")?;
        Some(mime)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().is_empty() {
            return Err(ClientError::EmptyField("character name"));
        }
        Ok(())
    }
}

/// Local character: free-text details plus the live trait registry
#[derive(Debug, Default)]
pub struct CharacterEditor {
    details: CharacterSheet,
    registry: TraitRegistry,
    saved: Option<String>,
}

impl CharacterEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &TraitRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TraitRegistry {
        &mut self.registry
    }

    /// Identity and free-text fields. The trait half of the returned sheet
    /// is not kept current; use [`CharacterEditor::to_sheet`] for that.
    pub fn details(&self) -> &CharacterSheet {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut CharacterSheet {
        &mut self.details
    }

    /// The archetype label lives on the archetype trait
    pub fn set_archetype(&mut self, name: &str) -> Result<(), ClientError> {
        self.registry.rename_trait(ARCHETYPE_ID, name)
    }

    pub fn to_sheet(&self) -> CharacterSheet {
        let mut sheet = self.details.clone();
        sheet.traits = self.registry.export();
        sheet.archetype = self.registry.archetype().name.clone();
        sheet
    }

    /// Replace everything with a saved sheet. No merge.
    pub fn load(&mut self, sheet: CharacterSheet) {
        self.registry.load(&sheet.traits, &sheet.archetype);
        self.details = sheet;
        self.saved = Some(self.to_sheet().fingerprint());
    }

    /// Sheet to send in `save_character`
    pub fn save_request(&self) -> Result<CharacterSheet, ClientError> {
        let sheet = self.to_sheet();
        sheet.validate()?;
        Ok(sheet)
    }

    /// The server echoed our save back
    pub fn mark_saved(&mut self, sheet: &CharacterSheet) {
        self.saved = Some(sheet.fingerprint());
        log(Level::Info, Domain::Character, "saved", obj(&[("name", v_str(&sheet.name))]));
    }

    pub fn is_dirty(&self) -> bool {
        match &self.saved {
            Some(fp) => *fp != self.to_sheet().fingerprint(),
            None => *self != CharacterEditor::default(),
        }
    }
}

impl PartialEq for CharacterEditor {
    fn eq(&self, other: &Self) -> bool {
        self.to_sheet() == other.to_sheet()
    }
}

/// Other players' sheets, keyed by player name
#[derive(Debug, Clone, Default)]
pub struct CharacterRoster {
    sheets: BTreeMap<String, CharacterSheet>,
    is_master: bool,
}

impl CharacterRoster {
    pub fn replace(&mut self, sheets: BTreeMap<String, CharacterSheet>, is_master: bool) {
        self.sheets = sheets;
        self.is_master = is_master;
    }

    pub fn upsert(&mut self, player: &str, sheet: CharacterSheet) {
        self.sheets.insert(player.to_string(), sheet);
    }

    pub fn get(&self, player: &str) -> Option<&CharacterSheet> {
        self.sheets.get(player)
    }

    pub fn players(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn is_master(&self) -> bool {
        self.is_master
    }

    pub fn clear(&mut self) {
        self.sheets.clear();
        self.is_master = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TraitKind;

    #[test]
    fn test_decodes_server_document_with_nulls() {
        let doc = serde_json::json!({
            "name": "Aria",
            "motivation": null,
            "archetype": "Bard",
            "photo": null,
            "traits": [{"id": "archetype", "type": "archetype", "name": "Bard"}],
            "selected_traits": [],
            "empowered_traits": [],
            "quality_counter": 0,
            "ability_counter": 0,
            "misfortunes": ["Lost", {"level": 2}],
            "lessons": null,
            "resources": null,
            "notes": "x"
        });
        let sheet: CharacterSheet = serde_json::from_value(doc).unwrap();
        assert_eq!(sheet.motivation, "");
        assert_eq!(sheet.misfortunes, vec!["Lost".to_string(), r#"{"level":2}"#.to_string()]);
        assert!(sheet.lessons.is_empty());
        assert_eq!(sheet.traits.traits.len(), 1);
    }

    #[test]
    fn test_serializes_trait_fields_at_top_level() {
        let sheet = CharacterSheet { name: "Aria".into(), ..Default::default() };
        let v = serde_json::to_value(&sheet).unwrap();
        assert!(v.get("selected_traits").is_some());
        assert!(v.get("quality_counter").is_some());
        assert!(v.get("traits").unwrap().is_array());
    }

    #[test]
    fn test_photo_data_url() {
        let mut sheet = CharacterSheet::default();
        sheet.set_photo(&[0x89, b'P', b'N', b'G'], "image/png");
        assert!(sheet.photo.starts_with("data:image/png;base64,"));
        assert_eq!(sheet.photo_mime(), Some("image/png"));
        assert_eq!(sheet.photo_bytes().unwrap(), vec![0x89, b'P', b'N', b'G']);
        sheet.photo = "not a data url".into();
        assert!(sheet.photo_bytes().is_none());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = CharacterSheet { name: "Aria".into(), ..Default::default() };
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        b.notes = "changed".into();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_editor_dirty_tracking() {
        let mut ed = CharacterEditor::new();
        assert!(!ed.is_dirty());
        ed.details_mut().name = "Aria".into();
        assert!(ed.is_dirty());
        let sheet = ed.save_request().unwrap();
        ed.mark_saved(&sheet);
        assert!(!ed.is_dirty());
        ed.registry_mut().add_trait(TraitKind::Quality).unwrap();
        assert!(ed.is_dirty());
    }

    #[test]
    fn test_archetype_label_follows_trait() {
        let mut ed = CharacterEditor::new();
        ed.set_archetype("Knight").unwrap();
        assert_eq!(ed.to_sheet().archetype, "Knight");
    }

    #[test]
    fn test_save_requires_name() {
        let ed = CharacterEditor::new();
        assert_eq!(ed.save_request(), Err(ClientError::EmptyField("character name")));
    }
}
