//! 会议议程注册表
//!
//! 大会的工作组与议程条目是静态数据，直接硬编码为查找表。

use serde::Serialize;

/// 工作组
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingTrack {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// 议程条目
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceSession {
    pub id: &'static str,
    pub title: &'static str,
    pub track: &'static str,
    pub time: &'static str,
    pub description: &'static str,
}

pub const TRACKS: &[WorkingTrack] = &[
    WorkingTrack {
        id: "identity",
        name: "Identity Working Group",
        description: "Decentralised identity, key management and accountability.",
    },
    WorkingTrack {
        id: "security",
        name: "Cybersecurity Working Group",
        description: "Wallet governance, incident response and security information sharing.",
    },
    WorkingTrack {
        id: "financial-applications",
        name: "Financial Applications Working Group",
        description: "Stablecoins, DeFi oversight and policy interoperability.",
    },
    WorkingTrack {
        id: "general",
        name: "Plenary & General",
        description: "Opening, closing and cross-track plenary sessions.",
    },
];

pub const SESSIONS: &[ConferenceSession] = &[
    ConferenceSession {
        id: "opening-plenary",
        title: "Opening Plenary",
        track: "general",
        time: "Day 1 09:00",
        description: "Welcome, agenda overview and keynote on multi-stakeholder governance.",
    },
    ConferenceSession {
        id: "identity-did",
        title: "DID Interoperability Roundtable",
        track: "identity",
        time: "Day 1 11:00",
        description: "Decentralised identifier profiles and cross-chain accountability.",
    },
    ConferenceSession {
        id: "security-wallet",
        title: "Wallet Governance Workshop",
        track: "security",
        time: "Day 1 14:00",
        description: "Custody models, key-loss recovery and governance of wallet software.",
    },
    ConferenceSession {
        id: "finapp-stablecoin",
        title: "Stablecoin Oversight Session",
        track: "financial-applications",
        time: "Day 2 10:00",
        description: "Reserve transparency, redemption rights and supervisory reporting.",
    },
    ConferenceSession {
        id: "agent-hackathon",
        title: "Agent Hackathon Showcase",
        track: "general",
        time: "Day 2 15:00",
        description: "Demos of the conference multi-agent assistants and tooling.",
    },
    ConferenceSession {
        id: "closing-plenary",
        title: "Closing Plenary",
        track: "general",
        time: "Day 2 17:00",
        description: "Working group readouts and next-block planning.",
    },
];

/// 按 ID 查找议程条目
pub fn find_session(id: &str) -> Option<&'static ConferenceSession> {
    SESSIONS.iter().find(|s| s.id == id)
}

/// 按 ID 查找工作组
pub fn find_track(id: &str) -> Option<&'static WorkingTrack> {
    TRACKS.iter().find(|t| t.id == id)
}
