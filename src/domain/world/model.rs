//! World Context - 世界模型

use serde::{Deserialize, Serialize};

use crate::domain::manuscript::ChapterNumber;

/// 世界模型条目（角色、地点、事件、规则）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldEntity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 首次出现章节
    #[serde(default)]
    pub first_chapter: Option<ChapterNumber>,
}

impl WorldEntity {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        first_chapter: Option<ChapterNumber>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            first_chapter,
        }
    }

    fn key(&self) -> String {
        self.name.trim().to_lowercase()
    }

    /// 合并同名条目：保留更长的描述和更早的首次出现章节
    fn absorb(&mut self, other: &WorldEntity) {
        if other.description.trim().chars().count() > self.description.trim().chars().count() {
            self.description = other.description.clone();
        }
        self.first_chapter = match (self.first_chapter, other.first_chapter) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}

/// 世界模型
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldModel {
    #[serde(default)]
    pub characters: Vec<WorldEntity>,
    #[serde(default)]
    pub locations: Vec<WorldEntity>,
    #[serde(default)]
    pub timeline_events: Vec<WorldEntity>,
    #[serde(default)]
    pub world_rules: Vec<WorldEntity>,
    #[serde(default)]
    pub setting_period: Option<String>,
}

impl WorldModel {
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
            && self.locations.is_empty()
            && self.timeline_events.is_empty()
            && self.world_rules.is_empty()
            && self.setting_period.is_none()
    }

    pub fn entity_count(&self) -> usize {
        self.characters.len() + self.locations.len() + self.timeline_events.len() + self.world_rules.len()
    }

    /// 合并另一个（部分）世界模型
    ///
    /// 幂等：merge(a, a) == a
    pub fn merge(&mut self, other: &WorldModel) {
        merge_entities(&mut self.characters, &other.characters);
        merge_entities(&mut self.locations, &other.locations);
        merge_entities(&mut self.timeline_events, &other.timeline_events);
        merge_entities(&mut self.world_rules, &other.world_rules);

        let incoming = other
            .setting_period
            .as_ref()
            .filter(|p| !p.trim().is_empty());
        match (&self.setting_period, incoming) {
            (None, Some(p)) => self.setting_period = Some(p.clone()),
            (Some(current), Some(p)) if p.trim().len() > current.trim().len() => {
                self.setting_period = Some(p.clone())
            }
            _ => {}
        }
    }

    /// 合并多个批次结果
    pub fn merge_all<'a>(parts: impl IntoIterator<Item = &'a WorldModel>) -> WorldModel {
        let mut model = WorldModel::default();
        for part in parts {
            model.merge(part);
        }
        model
    }
}

fn merge_entities(target: &mut Vec<WorldEntity>, incoming: &[WorldEntity]) {
    // 先在自身内部去重，保证合并结果与输入顺序无关的唯一性
    dedupe_in_place(target);
    for entity in incoming {
        if entity.name.trim().is_empty() {
            continue;
        }
        let key = entity.key();
        match target.iter_mut().find(|e| e.key() == key) {
            Some(existing) => existing.absorb(entity),
            None => target.push(entity.clone()),
        }
    }
}

fn dedupe_in_place(entities: &mut Vec<WorldEntity>) {
    let mut result: Vec<WorldEntity> = Vec::with_capacity(entities.len());
    for entity in entities.drain(..) {
        if entity.name.trim().is_empty() {
            continue;
        }
        let key = entity.key();
        match result.iter_mut().find(|e| e.key() == key) {
            Some(existing) => existing.absorb(&entity),
            None => result.push(entity),
        }
    }
    *entities = result;
}
