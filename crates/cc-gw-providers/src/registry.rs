/// A well-known OpenAI-compatible (or Anthropic-compatible) provider,
/// letting the admin UI prefill base URL + default model without the
/// user looking them up. Trimmed and extended from
/// `skynet_agent::registry::KNOWN_PROVIDERS` — commercial/self-hosted
/// entries outside this gateway's named wire families
/// (openai/anthropic/deepseek/kimi/huawei/custom) are dropped, and a new
/// Huawei entry is added per spec's wire family list.
pub struct KnownProvider {
    pub id: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_model: &'static str,
}

pub const KNOWN_PROVIDERS: &[KnownProvider] = &[
    KnownProvider {
        id: "anthropic",
        name: "Anthropic",
        base_url: "https://api.anthropic.com",
        default_model: "claude-3-7-sonnet-20250219",
    },
    KnownProvider {
        id: "openai",
        name: "OpenAI",
        base_url: "https://api.openai.com",
        default_model: "gpt-4o",
    },
    KnownProvider {
        id: "deepseek",
        name: "DeepSeek",
        base_url: "https://api.deepseek.com",
        default_model: "deepseek-chat",
    },
    KnownProvider {
        id: "moonshot",
        name: "Moonshot AI (Kimi)",
        base_url: "https://api.moonshot.cn",
        default_model: "moonshot-v1-8k",
    },
    KnownProvider {
        id: "huawei",
        name: "Huawei Cloud (Pangu)",
        base_url: "https://api.modelarts-maas.com",
        default_model: "pangu-pro",
    },
];

pub fn lookup(id: &str) -> Option<&'static KnownProvider> {
    KNOWN_PROVIDERS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huawei_entry_present() {
        assert!(lookup("huawei").is_some());
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(lookup("nonexistent").is_none());
    }
}
