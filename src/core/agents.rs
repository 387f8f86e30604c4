//! Live agent records, one per agent name.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Active,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub name: String,
    pub status: AgentStatus,
    pub status_text: String,
    pub is_streaming: bool,
}

/// Agents in start order; the most recently started one is last.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentInfo>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AgentInfo> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn all(&self) -> &[AgentInfo] {
        &self.agents
    }

    fn upsert(&mut self, name: &str) -> &mut AgentInfo {
        let index = match self.agents.iter().position(|a| a.name == name) {
            Some(index) => index,
            None => {
                self.agents.push(AgentInfo {
                    name: name.to_string(),
                    status: AgentStatus::Active,
                    status_text: String::new(),
                    is_streaming: false,
                });
                self.agents.len() - 1
            }
        };
        &mut self.agents[index]
    }

    /// Mark `name` active and make it the most recent entry (last in order).
    pub fn start(&mut self, name: &str, status_text: &str) {
        if let Some(index) = self.agents.iter().position(|a| a.name == name) {
            let agent = self.agents.remove(index);
            self.agents.push(agent);
        }
        let agent = self.upsert(name);
        agent.status = AgentStatus::Active;
        agent.status_text = status_text.to_string();
        agent.is_streaming = true;
    }

    pub fn set_status_text(&mut self, name: &str, status_text: &str) {
        self.upsert(name).status_text = status_text.to_string();
    }

    /// Track whether `name` is mid-way through a streamed reply.
    pub fn set_streaming(&mut self, name: &str, streaming: bool) {
        self.upsert(name).is_streaming = streaming;
    }

    pub fn complete(&mut self, name: &str, status_text: &str) {
        let agent = self.upsert(name);
        agent.status = AgentStatus::Complete;
        agent.is_streaming = false;
        if !status_text.is_empty() {
            agent.status_text = status_text.to_string();
        }
    }

    pub fn complete_all(&mut self) {
        for agent in &mut self.agents {
            agent.status = AgentStatus::Complete;
            agent.is_streaming = false;
        }
    }

    /// Most recently started agent that is still active.
    pub fn active(&self) -> Option<&AgentInfo> {
        self.agents
            .iter()
            .rev()
            .find(|a| a.status == AgentStatus::Active)
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }
}
