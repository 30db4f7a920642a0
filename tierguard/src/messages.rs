use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::gate::AssistantId;

/// Locale of the rendered message. `En` is the fallback for locales with
/// no string table.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    /// Resolve a BCP 47-ish hint ("es", "es-CO", "en_US") to a supported
    /// locale, defaulting to English.
    pub fn from_hint(hint: Option<&str>) -> Self {
        let prefix: String = hint
            .unwrap_or("")
            .chars()
            .take(2)
            .collect::<String>()
            .to_ascii_lowercase();
        match prefix.as_str() {
            "es" => Locale::Es,
            _ => Locale::En,
        }
    }
}

/// Message category the gate asks to have rendered. Quota exhaustion and
/// feature gating are deliberately distinct categories: "come back later"
/// versus "this tier cannot use this assistant".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DecisionKind {
    DeniedTired,
    Resumed,
    ApproachingLimit,
    Reset,
    FeatureUnavailable,
}

/// Stateless table of tone-matched message variants keyed by
/// (assistant, kind, locale).
///
/// Variety is cosmetic: the pseudo-random pick never influences the
/// admit/deny outcome, which is decided by the engine before any message
/// is rendered.
pub struct MessageLocalizer;

impl MessageLocalizer {
    pub fn render(assistant: AssistantId, kind: DecisionKind, locale: Locale) -> &'static str {
        let variants = Self::variants(assistant, kind, locale);
        let variants = if variants.is_empty() {
            Self::variants(assistant, kind, Locale::En)
        } else {
            variants
        };
        if variants.is_empty() {
            return "";
        }
        let idx = rand::rng().random_range(0..variants.len());
        variants[idx]
    }

    /// Coly is the warm marketplace guide; Max is the brisk business
    /// analyst. Keep new strings in character.
    pub(crate) fn variants(
        assistant: AssistantId,
        kind: DecisionKind,
        locale: Locale,
    ) -> &'static [&'static str] {
        use AssistantId::{Coly, Max};
        use DecisionKind::*;
        use Locale::{En, Es};

        match (assistant, kind, locale) {
            (Coly, DeniedTired, En) => &[
                "Phew! I've chatted so much this hour I need to catch my breath. Come back in a bit?",
                "My little voice needs a rest — I'll be back on the hour, promise!",
                "I'm all talked out for now! Give me until the top of the hour and I'm yours again.",
            ],
            (Coly, DeniedTired, Es) => &[
                "¡Uf! He hablado tanto esta hora que necesito recuperar el aliento. ¿Vuelves en un ratito?",
                "Mi vocecita necesita descansar. ¡Vuelvo en punto, lo prometo!",
            ],
            (Coly, Resumed, En) => &[
                "I'm back and bursting with energy! What are we hunting for today?",
                "Rested and ready! Tell me what you need and I'll find it.",
            ],
            (Coly, Resumed, Es) => &[
                "¡Volví con toda la energía! ¿Qué buscamos hoy?",
                "¡Descansada y lista! Cuéntame qué necesitas y lo encuentro.",
            ],
            (Coly, ApproachingLimit, En) => &[
                "Heads up — I'm starting to run low on chats this hour, so let's make these count!",
                "Just so you know, only a few more questions before I need my break!",
            ],
            (Coly, ApproachingLimit, Es) => &[
                "Ojo: me quedan pocos chats esta hora, ¡aprovechémoslos!",
                "Aviso: unas preguntitas más y tendré que tomar mi descanso.",
            ],
            (Coly, Reset, En) => &[
                "Fresh hour, fresh me! Your chats are topped back up.",
                "The clock rolled over — we can chat all over again!",
            ],
            (Coly, Reset, Es) => &[
                "¡Hora nueva, Coly nueva! Tus chats están recargados.",
            ],
            (Coly, FeatureUnavailable, En) => &[
                "I'd love to help, but my chats are reserved for upgraded accounts. An upgrade unlocks me!",
                "We haven't been introduced yet! Upgrade your plan and I'm all yours.",
            ],
            (Coly, FeatureUnavailable, Es) => &[
                "Me encantaría ayudarte, pero mis chats son para cuentas mejoradas. ¡Con un upgrade me desbloqueas!",
            ],
            (Max, DeniedTired, En) => &[
                "Hourly capacity reached. I'll pick this up at the top of the hour.",
                "That's my quota for this hour. Back shortly — queue your questions.",
            ],
            (Max, DeniedTired, Es) => &[
                "Capacidad de esta hora alcanzada. Retomo al inicio de la próxima.",
                "Esa fue mi cuota de la hora. Vuelvo en breve; ve anotando tus preguntas.",
            ],
            (Max, Resumed, En) => &[
                "Back online. Where were we?",
                "Capacity restored. Let's continue.",
            ],
            (Max, Resumed, Es) => &[
                "De vuelta en línea. ¿En qué estábamos?",
                "Capacidad restaurada. Continuemos.",
            ],
            (Max, ApproachingLimit, En) => &[
                "Note: approaching this hour's limit. Prioritize your remaining questions.",
                "Running low on capacity this hour — let's focus.",
            ],
            (Max, ApproachingLimit, Es) => &[
                "Nota: acercándonos al límite de esta hora. Prioriza tus preguntas restantes.",
            ],
            (Max, Reset, En) => &[
                "New hour, full capacity. Proceed.",
            ],
            (Max, Reset, Es) => &[
                "Hora nueva, capacidad completa. Adelante.",
            ],
            (Max, FeatureUnavailable, En) => &[
                "This assistant is available on business plans. Upgrade to get access.",
                "Not available on your current plan — a business upgrade unlocks me.",
            ],
            (Max, FeatureUnavailable, Es) => &[
                "Este asistente está disponible en planes de negocio. Mejora tu plan para acceder.",
            ],
        }
    }
}
