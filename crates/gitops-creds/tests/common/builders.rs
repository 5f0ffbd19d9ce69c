//! Builders for service requests.

#![allow(dead_code)]

use gitops_creds::{GitOpsConfigDto, GitProvider};

/// Builder for `GitOpsConfigDto` requests.
pub struct RequestBuilder {
    dto: GitOpsConfigDto,
}

impl RequestBuilder {
    /// A GitHub request for `https://github.com/org` with username `u` and token `t`.
    pub fn new() -> Self {
        Self {
            dto: GitOpsConfigDto {
                provider: Some(GitProvider::Github),
                username: "u".to_string(),
                token: "t".to_string(),
                git_hub_org_id: "org".to_string(),
                host: "https://github.com/org".to_string(),
                active: true,
                ..GitOpsConfigDto::default()
            },
        }
    }

    pub fn id(mut self, id: i64) -> Self {
        self.dto.id = Some(id);
        self
    }

    pub fn provider(mut self, provider: GitProvider) -> Self {
        self.dto.provider = Some(provider);
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.dto.host = host.to_string();
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.dto.username = username.to_string();
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.dto.token = token.to_string();
        self
    }

    pub fn gitlab_group(mut self, group: &str) -> Self {
        self.dto.git_lab_group_id = group.to_string();
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.dto.active = active;
        self
    }

    pub fn build(self) -> GitOpsConfigDto {
        self.dto
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
