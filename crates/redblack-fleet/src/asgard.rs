//! HTTP backend for an Asgard-style fleet control service.
//!
//! One [`Asgard`] value implements every control-plane seam: fleet
//! control, cluster directory, image catalog, autoscaling plane, and
//! load balancer health. Each profile is a base URL (one account and
//! region); calls use the profile named by the run context.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use http::StatusCode;
use redblack_core::{
    Config, EndpointState, Group, GroupName, HealthStatus, Instance, LifecycleState,
    LoadBalancer, RunContext, Tags, Task, TaskStatus,
};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::cloud::{AutoscalingPlane, GroupPage, ImageCatalog, LoadBalancerService};
use crate::control::FleetControl;
use crate::error::{FleetError, FleetResult};
use crate::http::{parse_url, resolve_location, HttpClient};
use crate::topology::{ClusterDirectory, ClusterMembers};

// ── Wire types ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TaskLink {
    url: String,
}

#[derive(Deserialize)]
struct TaskState {
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterGroup {
    auto_scaling_group_name: String,
}

#[derive(Deserialize)]
struct GroupEnvelope {
    group: GroupDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupList {
    groups: Vec<GroupDto>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupDto {
    auto_scaling_group_name: String,
    #[serde(default)]
    instances: Vec<InstanceDto>,
    #[serde(default)]
    tags: Vec<TagDto>,
    #[serde(default)]
    load_balancer_names: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceDto {
    instance_id: String,
    #[serde(default)]
    health_status: String,
    #[serde(default)]
    lifecycle_state: String,
}

#[derive(Deserialize)]
struct TagDto {
    key: String,
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadBalancerDto {
    #[serde(default)]
    instance_states: Vec<EndpointDto>,
}

#[derive(Deserialize)]
struct EndpointDto {
    state: String,
}

#[derive(Deserialize)]
struct ImageEnvelope {
    image: ImageDto,
}

#[derive(Deserialize)]
struct ImageDto {
    #[serde(default)]
    tags: Vec<TagDto>,
}

fn into_tags(tags: Vec<TagDto>) -> Tags {
    tags.into_iter().map(|t| (t.key, t.value)).collect()
}

impl From<GroupDto> for Group {
    fn from(dto: GroupDto) -> Self {
        Group {
            name: dto.auto_scaling_group_name,
            tags: into_tags(dto.tags),
            instances: dto
                .instances
                .into_iter()
                .map(|i| Instance {
                    instance_id: i.instance_id,
                    health_status: HealthStatus::parse(&i.health_status),
                    lifecycle_state: LifecycleState::parse(&i.lifecycle_state),
                })
                .collect(),
        }
    }
}

// ── Client ────────────────────────────────────────────────────────

pub struct Asgard {
    profiles: BTreeMap<String, Url>,
    default_base: Url,
    cluster_list_url: Url,
    http: HttpClient,
}

impl Asgard {
    pub fn from_config(config: &Config) -> FleetResult<Self> {
        config.validate()?;
        let (_, default) = config.profile(None)?;
        let profiles = config
            .profiles
            .iter()
            .map(|(name, p)| -> FleetResult<(String, Url)> {
                Ok((name.clone(), parse_url(&p.base_url)?))
            })
            .collect::<FleetResult<_>>()?;
        Ok(Self {
            profiles,
            default_base: parse_url(&default.base_url)?,
            cluster_list_url: parse_url(&config.cluster_list_url()?)?,
            http: HttpClient::new(config.timeouts.request()),
        })
    }

    fn base_url(&self, ctx: &RunContext) -> &Url {
        ctx.profile
            .as_deref()
            .and_then(|p| self.profiles.get(p))
            .unwrap_or(&self.default_base)
    }

    fn endpoint(&self, ctx: &RunContext, segments: &[&str]) -> FleetResult<Url> {
        under(self.base_url(ctx), segments)
    }

    /// POST a mutation and extract its task handle.
    async fn submit(&self, url: &Url, fields: &[(&str, &str)]) -> FleetResult<Task> {
        let response = self.http.post_form(url, fields).await?.error_for_status()?;

        if let Some(location) = &response.location {
            return Ok(Task::new(resolve_location(url, location)?));
        }
        match response.json::<TaskLink>() {
            Ok(link) => Ok(Task::new(resolve_location(url, &link.url)?)),
            Err(_) => Err(FleetError::MissingTask {
                url: url.to_string(),
            }),
        }
    }

    async fn group(&self, ctx: &RunContext, name: &str) -> FleetResult<GroupDto> {
        let url = self.endpoint(ctx, &["autoScaling", "show", &format!("{name}.json")])?;
        let response = self.http.get(&url).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Err(FleetError::GroupNotFound(name.to_string()));
        }
        let envelope: GroupEnvelope = response.error_for_status()?.json()?;
        Ok(envelope.group)
    }
}

/// `base` extended by `segments`, each percent-encoded as one path segment.
fn under(base: &Url, segments: &[&str]) -> FleetResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| FleetError::InvalidUrl {
            url: base.to_string(),
            reason: "not a hierarchical url".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// The JSON view of a task page.
fn task_status_url(task: &Task) -> FleetResult<Url> {
    let mut url = parse_url(&task.url)?;
    if !url.path().ends_with(".json") {
        let path = format!("{}.json", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl FleetControl for Asgard {
    async fn create_next_group(
        &self,
        ctx: &RunContext,
        cluster: &str,
        image_id: &str,
    ) -> FleetResult<Task> {
        let url = self.endpoint(ctx, &["cluster", "createNextGroup"])?;
        let fields = [
            ("name", cluster),
            ("imageId", image_id),
            ("trafficAllowed", "false"),
            ("checkHealth", "true"),
        ];
        let task = self.submit(&url, &fields).await?;
        info!(run = %ctx.run_id, %cluster, %image_id, task = %task, "requested next group");
        Ok(task)
    }

    async fn activate(&self, ctx: &RunContext, group: &str) -> FleetResult<Task> {
        let url = self.endpoint(ctx, &["cluster", "activate"])?;
        let task = self.submit(&url, &[("name", group)]).await?;
        info!(run = %ctx.run_id, %group, task = %task, "requested activation");
        Ok(task)
    }

    async fn deactivate(&self, ctx: &RunContext, group: &str) -> FleetResult<Task> {
        let url = self.endpoint(ctx, &["cluster", "deactivate"])?;
        let task = self.submit(&url, &[("name", group)]).await?;
        info!(run = %ctx.run_id, %group, task = %task, "requested deactivation");
        Ok(task)
    }

    async fn task_status(&self, _ctx: &RunContext, task: &Task) -> FleetResult<TaskStatus> {
        let url = task_status_url(task)?;
        let state: TaskState = self.http.get(&url).await?.error_for_status()?.json()?;
        Ok(TaskStatus::parse(&state.status))
    }

    async fn groups_for_cluster(
        &self,
        ctx: &RunContext,
        cluster: &str,
    ) -> FleetResult<Vec<GroupName>> {
        let url = self.endpoint(ctx, &["cluster", "show", &format!("{cluster}.json")])?;
        let groups: Vec<ClusterGroup> = self.http.get(&url).await?.error_for_status()?.json()?;
        Ok(groups.into_iter().map(|g| g.auto_scaling_group_name).collect())
    }

    async fn load_balancers_for(
        &self,
        ctx: &RunContext,
        group: &str,
    ) -> FleetResult<BTreeSet<String>> {
        let dto = self.group(ctx, group).await?;
        Ok(dto.load_balancer_names.into_iter().collect())
    }
}

#[async_trait]
impl ClusterDirectory for Asgard {
    async fn list_clusters(&self, _ctx: &RunContext) -> FleetResult<Vec<ClusterMembers>> {
        self.http
            .get(&self.cluster_list_url)
            .await?
            .error_for_status()?
            .json()
    }
}

#[async_trait]
impl ImageCatalog for Asgard {
    async fn image_tags(&self, ctx: &RunContext, image_id: &str) -> FleetResult<Tags> {
        let mut found = Vec::new();
        for (profile, base) in &self.profiles {
            let url = under(base, &["image", "show", &format!("{image_id}.json")])?;
            let response = self.http.get(&url).await?;
            // Other accounts not knowing the image is expected.
            if matches!(response.status, StatusCode::NOT_FOUND | StatusCode::FORBIDDEN) {
                debug!(run = %ctx.run_id, %profile, %image_id, "image not in profile");
                continue;
            }
            let envelope: ImageEnvelope = response.error_for_status()?.json()?;
            found.push((profile.as_str(), into_tags(envelope.image.tags)));
        }

        match found.len() {
            0 => Err(FleetError::ImageNotFound(image_id.to_string())),
            1 => Ok(found.remove(0).1),
            count => Err(FleetError::AmbiguousImage {
                image_id: image_id.to_string(),
                count,
                profiles: found.iter().map(|(p, _)| *p).collect::<Vec<_>>().join("/"),
            }),
        }
    }
}

#[async_trait]
impl AutoscalingPlane for Asgard {
    async fn list_groups(
        &self,
        ctx: &RunContext,
        next_token: Option<&str>,
    ) -> FleetResult<GroupPage> {
        let mut url = self.endpoint(ctx, &["autoScaling", "list.json"])?;
        if let Some(token) = next_token {
            url.query_pairs_mut().append_pair("nextToken", token);
        }
        let page: GroupList = self.http.get(&url).await?.error_for_status()?.json()?;
        Ok(GroupPage {
            groups: page.groups.into_iter().map(Group::from).collect(),
            next_token: page.next_token,
        })
    }

    async fn describe_group(&self, ctx: &RunContext, name: &str) -> FleetResult<Group> {
        self.group(ctx, name).await.map(Group::from)
    }
}

#[async_trait]
impl LoadBalancerService for Asgard {
    async fn describe_load_balancer(
        &self,
        ctx: &RunContext,
        name: &str,
    ) -> FleetResult<LoadBalancer> {
        let url = self.endpoint(ctx, &["loadBalancer", "show", &format!("{name}.json")])?;
        let dto: LoadBalancerDto = self.http.get(&url).await?.error_for_status()?.json()?;
        Ok(LoadBalancer {
            name: name.to_string(),
            instance_states: dto
                .instance_states
                .iter()
                .map(|s| EndpointState::parse(&s.state))
                .collect(),
        })
    }
}
