//! The `!ListOrgs` .. `!SetTopics` command family.

use super::OrgLookup;
use super::client::{GithubClient, RepoEdit};
use crate::command::validate::{homepage, repo_name, toggle};
use crate::command::{
    ArgSpec, CommandContext, CommandDefinition, CommandPlugin, CommandSpec, ParsedArgs,
};
use crate::config::GithubConfig;
use crate::error::Result;
use crate::{OutboundResponse, table};

use std::sync::Arc;
use std::time::Duration;

const ORG_HINT: &str = "Invalid org name sent in. Run `!ListOrgs` to see the valid orgs.";
const ORG_HELP: &str = "The organization that contains the repo.";
const LOWERCASE_BRANCH_NOTE: &str = "Please Note: GitHub prefers lowercase branch names. \
                                     You may encounter issues with uppercase letters.";
const KEY_ID_HELP: &str = "The ID of the key. Please run !ListKeys to get this.";

pub struct GithubPlugin {
    client: Arc<GithubClient>,
    orgs: Arc<OrgLookup>,
    repo_settle: Duration,
}

impl GithubPlugin {
    pub fn new(client: Arc<GithubClient>, config: &GithubConfig) -> Self {
        Self {
            client,
            orgs: Arc::new(OrgLookup::new(config.orgs.clone())),
            repo_settle: Duration::from_secs(config.repo_settle_secs),
        }
    }

    fn org_arg(&self, help: &str) -> ArgSpec {
        ArgSpec::positional("org", help).validate(self.orgs.validator(ORG_HINT))
    }

    fn repo_arg(help: &str) -> ArgSpec {
        ArgSpec::positional("repo", help).validate(repo_name())
    }

    /// Report a missing repo or a lookup failure; `true` when every repo exists.
    async fn repos_exist(&self, ctx: &CommandContext, org: &str, repos: &[&str]) -> bool {
        for repo in repos {
            match self.client.get_repo(org, repo).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    ctx.error(format!("This repository does not exist in {org}."))
                        .await;
                    return false;
                }
                Err(error) => {
                    ctx.error(format!("I encountered a problem:\n\n{error}")).await;
                    return false;
                }
            }
        }
        true
    }

    async fn github_user_exists(&self, ctx: &CommandContext, login: &str) -> bool {
        let name = &ctx.user.name;
        let failure = match self.client.get_user(login).await {
            Ok(Some(_)) => return true,
            Ok(None) => format!("@{name}: The GitHub user: {login} does not exist."),
            Err(error) => format!(
                "@{name}: A problem was encountered communicating with GitHub to verify the \
                 user's GitHub id. Here are the details:\n{error}"
            ),
        };
        ctx.send_threaded(OutboundResponse::error(failure)).await;
        false
    }

    async fn branch_exists(&self, ctx: &CommandContext, org: &str, repo: &str, branch: &str) -> bool {
        match self.client.branch_exists(org, repo, branch).await {
            Ok(true) => true,
            Ok(false) => {
                ctx.send_threaded(
                    OutboundResponse::error(format!(
                        "@{}: This repository does not have the branch: `{branch}`.",
                        ctx.user.name
                    ))
                    .with_markdown(),
                )
                .await;
                false
            }
            Err(error) => {
                ctx.error(format!("I encountered a problem:\n\n{error}")).await;
                false
            }
        }
    }

    async fn team_id(&self, ctx: &CommandContext, org: &str, team: &str) -> Option<u64> {
        let failure = match self.client.find_team_id(org, team).await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => format!("@{}: The GitHub team: {team} does not exist.", ctx.user.name),
            Err(error) => format!("@{}: I encountered a problem:\n\n{error}", ctx.user.name),
        };
        ctx.send_threaded(OutboundResponse::error(failure)).await;
        None
    }

    /// Apply a repo edit, reporting failure. `true` on success.
    async fn edit_repo(&self, ctx: &CommandContext, org: &str, repo: &str, edit: RepoEdit) -> bool {
        match self.client.modify_repo(org, repo, &edit).await {
            Ok(()) => true,
            Err(error) => {
                ctx.error(format!(
                    "Problem encountered modifying the repository.\n\
                     The response code from GitHub was: {error}"
                ))
                .await;
                false
            }
        }
    }

    async fn list_orgs(&self, ctx: &CommandContext) -> Result<()> {
        let table = table::simple(&["Alias", "Organization"], &self.orgs.rows());
        ctx.send(OutboundResponse::info(format!("```{table}```")).with_markdown())
            .await;
        Ok(())
    }

    async fn create_repo(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let Some(org_config) = self.orgs.resolve(&org) else {
            return Err(anyhow::anyhow!("org {org} is not managed").into());
        };

        ctx.working().await;

        match self.client.get_repo(&org, &repo).await {
            Ok(Some(_)) => {
                ctx.error(format!("This repository already exists in {org}!")).await;
                return Ok(());
            }
            Ok(None) => {}
            Err(error) => {
                ctx.error(format!("I encountered a problem:\n\n{error}")).await;
                return Ok(());
            }
        }

        let private = !org_config.public_only;
        if let Err(error) = self.client.create_repo(&org, &repo, private).await {
            ctx.error(format!("I encountered a problem:\n\n{error}")).await;
            return Ok(());
        }

        // GitHub may 404 team grants on a repository created moments ago.
        tokio::time::sleep(self.repo_settle).await;

        for team in &org_config.new_repo_teams {
            if let Err(error) = self
                .client
                .set_team_repo_permission(team.id, &org, &repo, &team.perm)
                .await
            {
                ctx.error(format!(
                    "I encountered a problem setting repo permissions for team {}: \n\n{error}",
                    team.name
                ))
                .await;
                return Ok(());
            }
        }

        tracing::info!(%org, %repo, private, user = %ctx.user.name, "created repository");
        let visibility = if private { "PRIVATE" } else { "PUBLIC" };
        ctx.send(OutboundResponse::success(format!(
            "@{}: The new repo: {repo} has been created in {org}.\n\
             You can access the repo at: https://github.com/{org}/{repo}\n\
             The repository is {visibility}.\n\
             You are free to set up the repo as you like.\n",
            ctx.user.name
        )))
        .await;
        Ok(())
    }

    async fn add_collab(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let collab = args.string("collab")?;
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let permission = args.string("permission")?;

        if !self.repos_exist(ctx, &org, &[&repo]).await
            || !self.github_user_exists(ctx, &collab).await
        {
            return Ok(());
        }

        ctx.working().await;

        if let Err(error) = self
            .client
            .add_collaborator(&org, &repo, &collab, &permission)
            .await
        {
            let detail = match error.github_status() {
                Some(status) => format!("The response code from GitHub was: {status}"),
                None => format!("Here are the details: {error}"),
            };
            ctx.error(format!(
                "Problem encountered adding the user as an outside collaborator.\n{detail}"
            ))
            .await;
            return Ok(());
        }

        ctx.send(
            OutboundResponse::success(format!(
                "@{}: The GitHub user: `{collab}` has been added as an outside collaborator \
                 with `{permission}` permissions to {org}/{repo}.",
                ctx.user.name
            ))
            .with_markdown(),
        )
        .await;
        Ok(())
    }

    async fn set_description(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let description = args.opt_string("description").unwrap_or_default();

        if !self.repos_exist(ctx, &org, &[&repo]).await {
            return Ok(());
        }
        ctx.working().await;

        let edit = RepoEdit {
            description: Some(description.clone()),
            ..RepoEdit::default()
        };
        if !self.edit_repo(ctx, &org, &repo, edit).await {
            return Ok(());
        }

        let text = if description.is_empty() {
            format!(
                "@{}: The {org}/{repo} repository's description field has been cleared.",
                ctx.user.name
            )
        } else {
            format!(
                "@{}: The {org}/{repo} repository's description has been modified to:\n\
                 `{description}`.",
                ctx.user.name
            )
        };
        ctx.send(OutboundResponse::success(text).with_markdown()).await;
        Ok(())
    }

    async fn set_homepage(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let homepage = args.opt_string("homepage").unwrap_or_default();

        if !self.repos_exist(ctx, &org, &[&repo]).await {
            return Ok(());
        }
        ctx.working().await;

        let edit = RepoEdit {
            homepage: Some(homepage.clone()),
            ..RepoEdit::default()
        };
        if !self.edit_repo(ctx, &org, &repo, edit).await {
            return Ok(());
        }

        let text = if homepage.is_empty() {
            format!(
                "@{}: The {org}/{repo} repository's homepage field has been cleared.",
                ctx.user.name
            )
        } else {
            format!(
                "@{}: The {org}/{repo} repository's homepage has been modified to:\n\
                 `{homepage}`.",
                ctx.user.name
            )
        };
        ctx.send(OutboundResponse::success(text).with_markdown()).await;
        Ok(())
    }

    async fn set_default_branch(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let branch = args.string("branch")?;

        if !self.repos_exist(ctx, &org, &[&repo]).await
            || !self.branch_exists(ctx, &org, &repo, &branch).await
        {
            return Ok(());
        }
        ctx.working().await;

        let edit = RepoEdit {
            default_branch: Some(branch.clone()),
            ..RepoEdit::default()
        };
        if !self.edit_repo(ctx, &org, &repo, edit).await {
            return Ok(());
        }

        ctx.send(
            OutboundResponse::success(format!(
                "@{}: The {org}/{repo} repository's default branch has been set to: `{branch}`.",
                ctx.user.name
            ))
            .with_markdown(),
        )
        .await;
        Ok(())
    }

    async fn list_prs(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let state = args.string("state")?;

        if !self.repos_exist(ctx, &org, &[&repo]).await {
            return Ok(());
        }
        ctx.working().await;

        let pulls = match self.client.list_pull_requests(&org, &repo, &state).await {
            Ok(pulls) => pulls,
            Err(error) => {
                ctx.error(format!(
                    "Problem encountered while getting pull requests from the repository.\n\
                     The response code from GitHub was: {error}"
                ))
                .await;
                return Ok(());
            }
        };

        if pulls.is_empty() {
            ctx.send(OutboundResponse::info(format!(
                "@{}: No matching pull requests were found in *{repo}*.",
                ctx.user.name
            )))
            .await;
            return Ok(());
        }

        let rows: Vec<Vec<String>> = pulls
            .into_iter()
            .map(|pull| {
                vec![
                    pull.number.to_string(),
                    pull.title,
                    pull.user.login,
                    pull.assignee
                        .map(|assignee| assignee.login)
                        .unwrap_or_else(|| "-".into()),
                    title_case(&pull.state),
                ]
            })
            .collect();
        let table = table::orgtbl(&["#PR", "Title", "Opened by", "Assignee", "State"], &rows);
        ctx.send(OutboundResponse::raw(format!(
            "Repository: *{repo}* \n\n```{table}```"
        )))
        .await;
        Ok(())
    }

    async fn delete_repo(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;

        if !self.repos_exist(ctx, &org, &[&repo]).await {
            return Ok(());
        }
        ctx.working().await;

        if let Err(error) = self.client.delete_repo(&org, &repo).await {
            ctx.error(format!("I encountered a problem:\n\n{error}")).await;
            return Ok(());
        }

        tracing::info!(%org, %repo, user = %ctx.user.name, "deleted repository");
        ctx.send(OutboundResponse::success(format!(
            "@{}: The repo: {repo} has been deleted from {org}.\n",
            ctx.user.name
        )))
        .await;
        Ok(())
    }

    async fn add_user_to_team(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let user_id = args.string("user_id")?;
        let org = args.string("org")?;
        let team = args.string("team")?;
        let role = args.string("role")?;

        if !self.github_user_exists(ctx, &user_id).await {
            return Ok(());
        }
        ctx.working().await;

        let Some(team_id) = self.team_id(ctx, &org, &team).await else {
            return Ok(());
        };

        if let Err(error) = self
            .client
            .add_team_membership(team_id, &user_id, &role)
            .await
        {
            let detail = match error.github_status() {
                Some(status) => format!("The response code from GitHub was: {status}"),
                None => format!("Here are the details: {error}"),
            };
            ctx.error(format!(
                "Problem encountered adding the user as a team member.\n{detail}"
            ))
            .await;
            return Ok(());
        }

        ctx.send(
            OutboundResponse::success(format!(
                "@{}: The GitHub user: `{user_id}` has been added as a team member with \
                 `{role}` permissions to {org}/{team}.",
                ctx.user.name
            ))
            .with_markdown(),
        )
        .await;
        Ok(())
    }

    async fn set_branch_protection(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let branch = args.string("branch")?;
        let enabled = args.get("toggle").is_truthy();

        if !self.repos_exist(ctx, &org, &[&repo]).await
            || !self.branch_exists(ctx, &org, &repo, &branch).await
        {
            return Ok(());
        }
        ctx.working().await;

        if let Err(error) = self
            .client
            .set_branch_protection(&org, &repo, &branch, enabled)
            .await
        {
            ctx.error(format!(
                "Problem encountered setting branch protection.\n\
                 The response code from GitHub was: {error}"
            ))
            .await;
            return Ok(());
        }

        let status = if enabled { "ENABLED" } else { "DISABLED" };
        ctx.send(
            OutboundResponse::success(format!(
                "@{}: The {org}/{repo} repository's {branch} branch protection status is now: \
                 {status}.",
                ctx.user.name
            ))
            .with_markdown(),
        )
        .await;
        Ok(())
    }

    async fn list_keys(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;

        if !self.repos_exist(ctx, &org, &[&repo]).await {
            return Ok(());
        }
        ctx.working().await;

        let keys = match self.client.list_deploy_keys(&org, &repo).await {
            Ok(keys) => keys,
            Err(error) => {
                ctx.error(format!(
                    "Problem encountered while getting deploy keys from the repository.\n\
                     The response code from GitHub was: {error}"
                ))
                .await;
                return Ok(());
            }
        };

        if keys.is_empty() {
            ctx.send(OutboundResponse::info(format!(
                "@{}: No deploy keys were found in *{repo}*.",
                ctx.user.name
            )))
            .await;
            return Ok(());
        }

        let rows: Vec<Vec<String>> = keys
            .into_iter()
            .map(|key| {
                let read_only = if key.read_only { "True" } else { "False" };
                vec![
                    key.id.to_string(),
                    key.title,
                    read_only.to_string(),
                    key.created_at,
                ]
            })
            .collect();
        let table = table::orgtbl(&["ID#", "Title", "Read-only", "Created"], &rows);
        ctx.send(OutboundResponse::raw(format!(
            "Deploy Keys: *{repo}* \n\n```{table}```"
        )))
        .await;
        Ok(())
    }

    async fn add_key(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let title = args.string("title")?;
        let read_only = args.get("readonly").is_truthy();
        let pubkey = args.string("pubkey")?;

        if !self.repos_exist(ctx, &org, &[&repo]).await {
            return Ok(());
        }
        ctx.working().await;

        match self
            .client
            .add_deploy_key(&org, &repo, &title, &pubkey, read_only)
            .await
        {
            Ok(Some(key)) => {
                ctx.send(OutboundResponse::raw(format!(
                    "Deploy Key *{}* with ID *{}* successfully added to *{repo}*\n\n",
                    key.title, key.id
                )))
                .await;
            }
            Ok(None) => {
                ctx.error("The deploy key entered was invalid -- or -- it already exists.")
                    .await;
            }
            Err(error) => {
                ctx.error(format!(
                    "Problem encountered while adding deploy key to the repository.\n\
                     The response code from GitHub was: {error}"
                ))
                .await;
            }
        }
        Ok(())
    }

    /// Fetch a deploy key, reporting absence or failure to the user.
    async fn find_key(
        &self,
        ctx: &CommandContext,
        org: &str,
        repo: &str,
        id: i64,
    ) -> Option<super::client::DeployKey> {
        let name = &ctx.user.name;
        match self.client.get_deploy_key(org, repo, id).await {
            Ok(Some(key)) => return Some(key),
            Ok(None) => {
                ctx.send(
                    OutboundResponse::error(format!(
                        "@{name}: Deploy Key with ID: `{id}` is not present for the {org}/{repo} repo."
                    ))
                    .with_markdown(),
                )
                .await;
            }
            Err(error) => {
                ctx.error(format!(
                    "Problem encountered while getting deploy key from the repository.\n\
                     The response code from GitHub was: {error}"
                ))
                .await;
                ctx.send(
                    OutboundResponse::error(format!("@{name}: Error Retrieving Deploy Key `{id}`."))
                        .with_markdown(),
                )
                .await;
            }
        }
        None
    }

    async fn delete_key(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let id = args.int("id")?;

        if !self.repos_exist(ctx, &org, &[&repo]).await {
            return Ok(());
        }
        ctx.working().await;

        if self.find_key(ctx, &org, &repo, id).await.is_none() {
            return Ok(());
        }

        if let Err(error) = self.client.delete_deploy_key(&org, &repo, id).await {
            ctx.error(format!(
                "Problem encountered while deleting deploy key to the repository.\n\
                 The response code from GitHub was: {error}"
            ))
            .await;
            ctx.send(
                OutboundResponse::info(format!(
                    "@{}: Error deleting deploy key ID *{id}*.",
                    ctx.user.name
                ))
                .with_markdown(),
            )
            .await;
            return Ok(());
        }

        ctx.send(OutboundResponse::raw(format!(
            "Deploy Key ID *{id}* successfully deleted from *{repo}*\n\n"
        )))
        .await;
        Ok(())
    }

    async fn get_key(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let id = args.int("id")?;

        if !self.repos_exist(ctx, &org, &[&repo]).await {
            return Ok(());
        }
        ctx.working().await;

        if let Some(key) = self.find_key(ctx, &org, &repo, id).await {
            ctx.send(
                OutboundResponse::info(format!(
                    "@{}: Deploy Key ID `{id}`: ```{}```",
                    ctx.user.name, key.key
                ))
                .with_markdown(),
            )
            .await;
        }
        Ok(())
    }

    async fn set_topics(&self, ctx: &CommandContext, args: &ParsedArgs) -> Result<()> {
        let org = args.string("org")?;
        let repo = args.string("repo")?;
        let topics = args.opt_string("topics").unwrap_or_default();
        let topics: Vec<String> = if topics.is_empty() {
            Vec::new()
        } else {
            topics.split(',').map(str::to_string).collect()
        };

        ctx.working().await;

        if let Err(error) = self.client.set_topics(&org, &repo, &topics).await {
            ctx.error(format!(
                "Problem encountered while setting topics to the repository.\n\
                 The response code from GitHub was: {error}"
            ))
            .await;
            return Ok(());
        }

        let text = if topics.is_empty() {
            format!("@{}: The repo: {repo}'s topics were cleared.", ctx.user.name)
        } else {
            format!(
                "@{}: The topics: `{}` were applied to the repo: {repo}",
                ctx.user.name,
                topics.join(", ")
            )
        };
        ctx.send(OutboundResponse::success(text).with_markdown()).await;
        Ok(())
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[async_trait::async_trait]
impl CommandPlugin for GithubPlugin {
    fn name(&self) -> &str {
        "github"
    }

    fn commands(&self) -> Vec<CommandDefinition> {
        vec![
            CommandDefinition::new("!ListOrgs", "Lists the GitHub organizations that are managed."),
            CommandDefinition::new(
                "!CreateRepo",
                "Creates a new PRIVATE [default] repository in the specified GitHub organization.",
            )
            .with_spec(
                CommandSpec::new(
                    "!CreateRepo",
                    "!CreateRepo <OrgToCreateRepoIn> <NewRepoName>",
                    "This will create a new repository on GitHub.",
                )
                .required(self.org_arg("The organization to create the repo in."))
                .required(Self::repo_arg("The name of the new repo to create.").preserve_case()),
            ),
            CommandDefinition::new(
                "!AddCollab",
                "Adds an outside collaborator to a specific repository in a specific GitHub organization.",
            )
            .with_setting("permitted_permissions", &["push", "pull"])
            .with_spec(
                CommandSpec::new(
                    "!AddCollab",
                    "!AddCollab <OutsideCollabId> <OrgWithRepo> <Repo> <Permission>",
                    "This will add an outside collaborator to a repository with the given permission.",
                )
                .required(ArgSpec::positional("collab", "The outside collaborator's GitHub ID."))
                .required(self.org_arg(ORG_HELP))
                .required(Self::repo_arg(
                    "The repository to add the outside collaborator to.",
                ))
                .required(
                    ArgSpec::positional(
                        "permission",
                        "The permission to grant, must be one of: `{values}`",
                    )
                    .choices("permitted_permissions"),
                ),
            ),
            CommandDefinition::new("!SetDescription", "Adds/Modifies a GitHub repo's description.")
                .with_spec(
                    CommandSpec::new(
                        "!SetDescription",
                        "!SetDescription <OrgWithRepo> <Repo> <\"The description in quotes\">",
                        "This will set the repository's description.",
                    )
                    .required(self.org_arg(ORG_HELP))
                    .required(Self::repo_arg("The repository to set the description on."))
                    .required(
                        ArgSpec::positional(
                            "description",
                            "The description to set in quotes. (Empty quotes clears)",
                        )
                        .preserve_case(),
                    ),
                ),
            CommandDefinition::new("!SetHomepage", "Adds/Modifies a GitHub repo's homepage URL.")
                .with_spec(
                    CommandSpec::new(
                        "!SetHomepage",
                        "!SetHomepage <OrgWithRepo> <Repo> <\"http://theHomePageUrlInQuotes\" - OR - \"\" to remove>",
                        "This will set the repository's homepage.",
                    )
                    .required(self.org_arg(ORG_HELP))
                    .required(Self::repo_arg("The repository to set the homepage on."))
                    .required(
                        ArgSpec::positional(
                            "homepage",
                            "The homepage to set in quotes. (Empty quotes clears)",
                        )
                        .validate(homepage()),
                    ),
                ),
            CommandDefinition::new("!SetDefaultBranch", "Sets the default branch for a repo.")
                .with_spec(
                    CommandSpec::new(
                        "!SetDefaultBranch",
                        "!SetDefaultBranch <OrgThatHasRepo> <Repo> <BranchName>",
                        &format!(
                            "This will set the default branch on a GitHub repo.\n\n{LOWERCASE_BRANCH_NOTE}"
                        ),
                    )
                    .required(self.org_arg(ORG_HELP))
                    .required(Self::repo_arg("The name of the repo to set the default on."))
                    .required(
                        ArgSpec::positional(
                            "branch",
                            "The name of the branch to set as default. (Case-Sensitive)",
                        )
                        .preserve_case(),
                    ),
                ),
            CommandDefinition::new("!ListPRs", "List the Pull Requests for a repo.")
                .with_setting("permitted_states", &["open", "closed", "all"])
                .with_spec(
                    CommandSpec::new(
                        "!ListPRs",
                        "!ListPRs <OrgThatHasRepo> <Repo> <State>",
                        "This will list pull requests for a repo.",
                    )
                    .required(self.org_arg(ORG_HELP))
                    .required(Self::repo_arg("The name of the repo to list PRs on."))
                    .required(
                        ArgSpec::positional(
                            "state",
                            "The state of the PR. Must be one of: `{values}`",
                        )
                        .choices("permitted_states"),
                    ),
                ),
            CommandDefinition::new("!DeleteRepo", "Delete a GitHub repository.").with_spec(
                CommandSpec::new(
                    "!DeleteRepo",
                    "!DeleteRepo <OrgThatHasRepo> <RepoToDelete>",
                    "This will delete a repo from a GitHub organization.",
                )
                .required(self.org_arg(ORG_HELP))
                .required(Self::repo_arg("The name of the new repo to delete.")),
            ),
            CommandDefinition::new(
                "!AddUserToTeam",
                "Adds a GitHub user to a specific team inside the organization.",
            )
            .with_setting("permitted_roles", &["member", "maintainer"])
            .with_spec(
                CommandSpec::new(
                    "!AddUserToTeam",
                    "!AddUserToTeam <UserGitHubId> <Org> <Team> <Role>",
                    "This will add a GitHub user to a team with a specified role.",
                )
                .required(ArgSpec::positional("user_id", "The user's GitHub ID."))
                .required(self.org_arg("The organization that contains the team."))
                .required(ArgSpec::positional("team", "The team to add the user to."))
                .required(
                    ArgSpec::positional("role", "The role to grant the user. Must be one of: `{values}`")
                        .choices("permitted_roles"),
                ),
            ),
            CommandDefinition::new("!SetBranchProtection", "Toggles the branch protection for a repo.")
                .with_spec(
                    CommandSpec::new(
                        "!SetBranchProtection",
                        "!SetBranchProtection <OrgThatHasRepo> <Repo> <BranchName> <On|Off>",
                        &format!(
                            "This will enable basic branch protection to a GitHub repo.\n\n{LOWERCASE_BRANCH_NOTE}"
                        ),
                    )
                    .required(self.org_arg(ORG_HELP))
                    .required(Self::repo_arg("The name of the repo to set the default on."))
                    .required(
                        ArgSpec::positional(
                            "branch",
                            "The name of the branch to set as default. (Case-Sensitive)",
                        )
                        .preserve_case(),
                    )
                    .required(
                        ArgSpec::positional(
                            "toggle",
                            "Toggle to enable or disable branch protection",
                        )
                        .validate(toggle("toggle")),
                    ),
                ),
            CommandDefinition::new("!ListKeys", "List the Deploy Keys for a repo.").with_spec(
                CommandSpec::new(
                    "!ListKeys",
                    "!ListKeys <OrgThatHasRepo> <Repo>",
                    "This will list deploy keys for a repo.",
                )
                .required(self.org_arg(ORG_HELP))
                .required(Self::repo_arg("The name of the repo to list deploy keys on.")),
            ),
            CommandDefinition::new("!AddKey", "Add Deploy Key for a repo.").with_spec(
                CommandSpec::new(
                    "!AddKey",
                    "!AddKey <OrgThatHasRepo> <Repo> <KeyTitle> <ReadOnlyToggle on|off> <\"KeyInQuotes\">",
                    "This will add a deploy key to a repo.",
                )
                .required(self.org_arg(ORG_HELP))
                .required(Self::repo_arg("The name of the repo to add a deploy key to."))
                .required(
                    ArgSpec::positional("title", "The name of the deploy key. (Case-Sensitive)")
                        .preserve_case(),
                )
                .required(
                    ArgSpec::positional("readonly", "Toggle to indicate if this key is read-only.")
                        .validate(toggle("readonly")),
                )
                .required(
                    ArgSpec::positional(
                        "pubkey",
                        "The SSH *PUBLIC* key in quotes. (Case-Sensitive)",
                    )
                    .preserve_case(),
                ),
            ),
            CommandDefinition::new("!DeleteKey", "Delete Deploy Key from a repo.").with_spec(
                CommandSpec::new(
                    "!DeleteKey",
                    "!DeleteKey <OrgThatHasRepo> <Repo> <KeyId>",
                    "This will delete the specified deploy key from a repo.",
                )
                .required(self.org_arg(ORG_HELP))
                .required(Self::repo_arg(
                    "The name of the repo to remove the deploy key from.",
                ))
                .required(ArgSpec::positional("id", KEY_ID_HELP).int()),
            ),
            CommandDefinition::new("!GetKey", "Get Deploy Key Public Key").with_spec(
                CommandSpec::new(
                    "!GetKey",
                    "!GetKey <OrgThatHasRepo> <Repo> <KeyId>",
                    "This will fetch the details of a specified deploy key from a repo.",
                )
                .required(self.org_arg(ORG_HELP))
                .required(Self::repo_arg(
                    "The name of the repo to fetch the deploy key details from.",
                ))
                .required(ArgSpec::positional("id", KEY_ID_HELP).int()),
            ),
            CommandDefinition::new("!SetTopics", "Sets the Topics for a GitHub repo").with_spec(
                CommandSpec::new(
                    "!SetTopics",
                    "!SetTopics <OrgThatContainsRepo> <RepoToSetTopicsOn> <CommaSeparatedListOfTopics>",
                    "This sets (or clears) the topics for a repository on GitHub.",
                )
                .required(self.org_arg(ORG_HELP))
                .required(Self::repo_arg("The name of the repo to set the topics on.").preserve_case())
                .optional(
                    ArgSpec::positional(
                        "topics",
                        "A comma separated list of topics to set on a repo. If omitted, this will \
                         clear out the topics. Note: This will replace all existing topics.",
                    )
                    .default(""),
                ),
            ),
        ]
    }

    async fn execute(&self, ctx: &CommandContext, command: &str, args: ParsedArgs) -> Result<()> {
        match command {
            "!ListOrgs" => self.list_orgs(ctx).await,
            "!CreateRepo" => self.create_repo(ctx, &args).await,
            "!AddCollab" => self.add_collab(ctx, &args).await,
            "!SetDescription" => self.set_description(ctx, &args).await,
            "!SetHomepage" => self.set_homepage(ctx, &args).await,
            "!SetDefaultBranch" => self.set_default_branch(ctx, &args).await,
            "!ListPRs" => self.list_prs(ctx, &args).await,
            "!DeleteRepo" => self.delete_repo(ctx, &args).await,
            "!AddUserToTeam" => self.add_user_to_team(ctx, &args).await,
            "!SetBranchProtection" => self.set_branch_protection(ctx, &args).await,
            "!ListKeys" => self.list_keys(ctx, &args).await,
            "!AddKey" => self.add_key(ctx, &args).await,
            "!DeleteKey" => self.delete_key(ctx, &args).await,
            "!GetKey" => self.get_key(ctx, &args).await,
            "!SetTopics" => self.set_topics(ctx, &args).await,
            other => Err(anyhow::anyhow!("github plugin has no command {other}").into()),
        }
    }
}
