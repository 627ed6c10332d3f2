//! Trait registry: the archetype singleton plus qualities and abilities the
//! player adds, with the selection and empowerment sets used for scoring.
//!
//! Every mutation publishes a [`RegistryNotice`] carrying the recomputed
//! [`TokenTally`] to all subscribers. Presentation listens on those channels;
//! the registry knows nothing about it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::scoring::{self, TokenTally};

pub const ARCHETYPE_ID: &str = "archetype";
pub const QUALITY_CAP: usize = 6;
pub const ABILITY_CAP: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitKind {
    Ability,
    Quality,
    Archetype,
}

impl TraitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraitKind::Ability => "ability",
            TraitKind::Quality => "quality",
            TraitKind::Archetype => "archetype",
        }
    }

    /// None for the archetype, which is never added or removed
    pub fn cap(&self) -> Option<usize> {
        match self {
            TraitKind::Ability => Some(ABILITY_CAP),
            TraitKind::Quality => Some(QUALITY_CAP),
            TraitKind::Archetype => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trait {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TraitKind,
    #[serde(default)]
    pub name: String,
}

/// The trait half of a character sheet, in its wire shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitSnapshot {
    #[serde(default)]
    pub traits: Vec<Trait>,
    #[serde(default)]
    pub selected_traits: Vec<String>,
    #[serde(default)]
    pub empowered_traits: Vec<String>,
    #[serde(default)]
    pub quality_counter: u32,
    #[serde(default)]
    pub ability_counter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added(Trait),
    Removed(String),
    Renamed { id: String, name: String },
    Selected { id: String, on: bool },
    Empowered { id: String, on: bool },
    ModifierChanged(i64),
    ResetAfterRoll { cleared: usize },
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryNotice {
    pub change: RegistryChange,
    pub tally: TokenTally,
}

#[derive(Debug)]
pub struct TraitRegistry {
    traits: Vec<Trait>,
    selected: BTreeSet<String>,
    empowered: BTreeSet<String>,
    modifier: i64,
    quality_count: u32,
    ability_count: u32,
    // Suffix sequences; never reused within a session
    next_quality: u32,
    next_ability: u32,
    subscribers: Vec<mpsc::UnboundedSender<RegistryNotice>>,
}

impl TraitRegistry {
    pub fn new(archetype_name: &str) -> Self {
        Self {
            traits: vec![Trait {
                id: ARCHETYPE_ID.to_string(),
                kind: TraitKind::Archetype,
                name: archetype_name.to_string(),
            }],
            selected: BTreeSet::new(),
            empowered: BTreeSet::new(),
            modifier: 0,
            quality_count: 0,
            ability_count: 0,
            next_quality: 1,
            next_ability: 1,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RegistryNotice> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn traits(&self) -> &[Trait] {
        &self.traits
    }

    pub fn get(&self, id: &str) -> Option<&Trait> {
        self.traits.iter().find(|t| t.id == id)
    }

    pub fn archetype(&self) -> &Trait {
        // Index 0 is the archetype from construction and every load
        &self.traits[0]
    }

    pub fn count(&self, kind: TraitKind) -> u32 {
        match kind {
            TraitKind::Quality => self.quality_count,
            TraitKind::Ability => self.ability_count,
            TraitKind::Archetype => 1,
        }
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn empowered(&self) -> &BTreeSet<String> {
        &self.empowered
    }

    pub fn modifier(&self) -> i64 {
        self.modifier
    }

    pub fn tally(&self) -> TokenTally {
        scoring::tally(&self.selected, &self.empowered, self.modifier)
    }

    pub fn add_trait(&mut self, kind: TraitKind) -> Result<Trait, ClientError> {
        let cap = kind.cap().ok_or(ClientError::ArchetypeLocked)?;
        if self.count(kind) as usize >= cap {
            return Err(ClientError::CapacityExceeded { kind, cap });
        }
        let id = match kind {
            TraitKind::Quality => {
                let n = self.next_quality;
                self.next_quality += 1;
                self.quality_count += 1;
                format!("quality-{}", n)
            }
            TraitKind::Ability => {
                let n = self.next_ability;
                self.next_ability += 1;
                self.ability_count += 1;
                format!("ability-{}", n)
            }
            TraitKind::Archetype => return Err(ClientError::ArchetypeLocked),
        };
        let t = Trait { id, kind, name: String::new() };
        self.traits.push(t.clone());
        self.publish(RegistryChange::Added(t.clone()));
        Ok(t)
    }

    /// Unknown ids and the archetype are left alone. Returns whether anything
    /// was removed.
    pub fn remove_trait(&mut self, id: &str) -> bool {
        if id == ARCHETYPE_ID {
            return false;
        }
        let Some(pos) = self.traits.iter().position(|t| t.id == id) else {
            return false;
        };
        let removed = self.traits.remove(pos);
        self.selected.remove(id);
        self.empowered.remove(id);
        match removed.kind {
            TraitKind::Quality => self.quality_count = self.quality_count.saturating_sub(1),
            TraitKind::Ability => self.ability_count = self.ability_count.saturating_sub(1),
            TraitKind::Archetype => {}
        }
        self.publish(RegistryChange::Removed(removed.id));
        true
    }

    pub fn rename_trait(&mut self, id: &str, name: &str) -> Result<(), ClientError> {
        let t = self
            .traits
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ClientError::UnknownTrait(id.to_string()))?;
        t.name = name.to_string();
        self.publish(RegistryChange::Renamed { id: id.to_string(), name: name.to_string() });
        Ok(())
    }

    /// Returns the new selection state
    pub fn toggle_selected(&mut self, id: &str) -> Result<bool, ClientError> {
        self.check_scorable(id)?;
        let on = if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        };
        self.publish(RegistryChange::Selected { id: id.to_string(), on });
        Ok(on)
    }

    /// Returns the new empowerment state
    pub fn toggle_empowered(&mut self, id: &str) -> Result<bool, ClientError> {
        self.check_scorable(id)?;
        let on = if self.empowered.remove(id) {
            false
        } else {
            self.empowered.insert(id.to_string());
            true
        };
        self.publish(RegistryChange::Empowered { id: id.to_string(), on });
        Ok(on)
    }

    pub fn set_modifier(&mut self, modifier: i64) {
        self.modifier = modifier;
        self.publish(RegistryChange::ModifierChanged(modifier));
    }

    /// Clears the selection and consumes the empowerment of traits that were
    /// selected. Empowerment on unselected traits stays banked. Returns how
    /// many traits were cleared; 0 means nothing changed and nothing is
    /// published.
    pub fn reset_after_roll(&mut self) -> usize {
        if self.selected.is_empty() {
            return 0;
        }
        let cleared = self.selected.len();
        for id in std::mem::take(&mut self.selected) {
            self.empowered.remove(&id);
        }
        self.publish(RegistryChange::ResetAfterRoll { cleared });
        cleared
    }

    pub fn export(&self) -> TraitSnapshot {
        TraitSnapshot {
            traits: self.traits.clone(),
            selected_traits: self.selected.iter().cloned().collect(),
            empowered_traits: self.empowered.iter().cloned().collect(),
            quality_counter: self.quality_count,
            ability_counter: self.ability_count,
        }
    }

    /// Full replace from a saved sheet. Selections pointing at the archetype
    /// or at traits the sheet does not contain are dropped. ID sequences
    /// resume above every suffix seen so new traits never collide.
    pub fn load(&mut self, snap: &TraitSnapshot, archetype_name: &str) {
        let mut traits = vec![Trait {
            id: ARCHETYPE_ID.to_string(),
            kind: TraitKind::Archetype,
            name: archetype_name.to_string(),
        }];
        let mut quality_count = 0;
        let mut ability_count = 0;
        let mut max_quality = snap.quality_counter;
        let mut max_ability = snap.ability_counter;

        for t in &snap.traits {
            if t.kind == TraitKind::Archetype || t.id == ARCHETYPE_ID {
                if archetype_name.is_empty() && !t.name.is_empty() {
                    traits[0].name = t.name.clone();
                }
                continue;
            }
            if traits.iter().any(|existing| existing.id == t.id) {
                continue;
            }
            let suffix = id_suffix(&t.id).unwrap_or(0);
            match t.kind {
                TraitKind::Quality => {
                    quality_count += 1;
                    max_quality = max_quality.max(suffix);
                }
                TraitKind::Ability => {
                    ability_count += 1;
                    max_ability = max_ability.max(suffix);
                }
                TraitKind::Archetype => {}
            }
            traits.push(t.clone());
        }

        let known = |id: &String| id != ARCHETYPE_ID && traits.iter().any(|t| &t.id == id);
        self.selected = snap.selected_traits.iter().filter(|id| known(id)).cloned().collect();
        self.empowered = snap.empowered_traits.iter().filter(|id| known(id)).cloned().collect();
        self.traits = traits;
        self.quality_count = quality_count;
        self.ability_count = ability_count;
        self.next_quality = self.next_quality.max(max_quality + 1);
        self.next_ability = self.next_ability.max(max_ability + 1);
        self.modifier = 0;

        log(
            Level::Info,
            Domain::Traits,
            "loaded",
            obj(&[
                ("qualities", serde_json::json!(quality_count)),
                ("abilities", serde_json::json!(ability_count)),
                ("archetype", v_str(&self.traits[0].name)),
            ]),
        );
        self.publish(RegistryChange::Replaced);
    }

    fn check_scorable(&self, id: &str) -> Result<(), ClientError> {
        if id == ARCHETYPE_ID {
            return Err(ClientError::ArchetypeLocked);
        }
        match self.get(id) {
            Some(t) if t.kind == TraitKind::Archetype => Err(ClientError::ArchetypeLocked),
            Some(_) => Ok(()),
            None => Err(ClientError::UnknownTrait(id.to_string())),
        }
    }

    fn publish(&mut self, change: RegistryChange) {
        let notice = RegistryNotice { change, tally: self.tally() };
        self.subscribers.retain(|tx| tx.send(notice.clone()).is_ok());
    }
}

impl Default for TraitRegistry {
    fn default() -> Self {
        Self::new("")
    }
}

fn id_suffix(id: &str) -> Option<u32> {
    id.rsplit('-').next().and_then(|s| s.parse().ok())
}
