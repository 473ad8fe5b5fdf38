//! Level thresholds.
//!
//! Thresholds are cumulative XP and strictly increasing, so the active level
//! is the last entry whose threshold is not above the user's XP.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Level {
    pub level: i32,
    pub xp_required: i32,
    pub reward_credits: i32,
    pub name_en: &'static str,
    pub name_es: &'static str,
    pub icon: &'static str,
}

pub const LEVELS: &[Level] = &[
    Level { level: 1, xp_required: 0, reward_credits: 0, name_en: "Neophyte", name_es: "Neófito", icon: "🌑" },
    Level { level: 2, xp_required: 100, reward_credits: 1, name_en: "Apprentice", name_es: "Aprendiz", icon: "🌒" },
    Level { level: 3, xp_required: 250, reward_credits: 1, name_en: "Seeker", name_es: "Buscador", icon: "🌓" },
    Level { level: 4, xp_required: 500, reward_credits: 2, name_en: "Initiate", name_es: "Iniciado", icon: "🌔" },
    Level { level: 5, xp_required: 1000, reward_credits: 2, name_en: "Adept", name_es: "Adepto", icon: "🌕" },
    Level { level: 6, xp_required: 2000, reward_credits: 3, name_en: "Mystic", name_es: "Místico", icon: "✨" },
    Level { level: 7, xp_required: 3500, reward_credits: 3, name_en: "Oracle", name_es: "Oráculo", icon: "🔮" },
    Level { level: 8, xp_required: 5500, reward_credits: 5, name_en: "Seer", name_es: "Vidente", icon: "👁️" },
    Level { level: 9, xp_required: 8000, reward_credits: 5, name_en: "Sage", name_es: "Sabio", icon: "📜" },
    Level { level: 10, xp_required: 12000, reward_credits: 10, name_en: "Arcana Master", name_es: "Maestro de los Arcanos", icon: "👑" },
];

pub fn max_level() -> &'static Level {
    &LEVELS[LEVELS.len() - 1]
}

/// Highest level whose threshold is `<= xp`.
pub fn level_for(xp: i32) -> &'static Level {
    let mut current = &LEVELS[0];
    for level in LEVELS {
        if level.xp_required <= xp {
            current = level;
        } else {
            break;
        }
    }
    current
}

pub fn next_level(xp: i32) -> Option<&'static Level> {
    LEVELS.iter().find(|level| level.xp_required > xp)
}

/// Percentage towards the next level, 100 at the max level.
pub fn progress(xp: i32) -> f64 {
    let current = level_for(xp);
    match next_level(xp) {
        Some(next) => {
            let span = (next.xp_required - current.xp_required) as f64;
            let done = (xp - current.xp_required) as f64;
            (done / span * 100.0).clamp(0.0, 100.0)
        }
        None => 100.0,
    }
}

/// Every level crossed when XP moves from `old_xp` to `new_xp`, lowest first.
pub fn levels_gained(old_xp: i32, new_xp: i32) -> Vec<&'static Level> {
    LEVELS
        .iter()
        .filter(|level| level.xp_required > old_xp && level.xp_required <= new_xp)
        .collect()
}

#[derive(Debug, Serialize)]
pub struct LevelInfo {
    pub level: i32,
    pub name_en: &'static str,
    pub name_es: &'static str,
    pub icon: &'static str,
    pub xp: i32,
    pub current_level_xp: i32,
    pub next_level_xp: Option<i32>,
    pub progress: f64,
    pub is_max_level: bool,
}

impl LevelInfo {
    pub fn for_xp(xp: i32) -> Self {
        let current = level_for(xp);
        let next = next_level(xp);
        Self {
            level: current.level,
            name_en: current.name_en,
            name_es: current.name_es,
            icon: current.icon,
            xp,
            current_level_xp: current.xp_required,
            next_level_xp: next.map(|l| l.xp_required),
            progress: progress(xp),
            is_max_level: next.is_none(),
        }
    }
}
