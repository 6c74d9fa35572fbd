//! EKS cluster template: the control plane plus one managed node group.

use super::common::{header, output, region_variable, variable};
use crate::context::{RenderContext, attrs};
use crate::error::RenderError;
use crate::hcl::{Block, Expr, document};
use crate::registry::ResourceTemplate;
use infragen_core::ResourceType;

const DEFAULT_KUBERNETES_VERSION: &str = "1.29";
const DEFAULT_INSTANCE_TYPE: &str = "t3.large";

pub struct ContainerClusterTemplate;

impl ResourceTemplate for ContainerClusterTemplate {
    fn resource_type(&self) -> ResourceType {
        ResourceType::container_cluster()
    }

    fn required_attributes(&self) -> &'static [&'static str] {
        &["node_count"]
    }

    fn main(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let name = ctx.local_name();
        let node_count = ctx.require_u64("node_count")?;
        let min_nodes = ctx.u64("min_nodes")?.unwrap_or(node_count);
        let max_nodes = ctx.u64("max_nodes")?.unwrap_or(node_count.max(1).saturating_mul(2));
        let instance_types = ctx
            .string_list("instance_types")?
            .or(ctx.string_list("instance_type")?)
            .unwrap_or_else(|| vec![DEFAULT_INSTANCE_TYPE.to_string()]);

        let encrypted = ctx.bool(attrs::ENCRYPTED)?.unwrap_or(false);

        let mut cluster = Block::resource("aws_eks_cluster", name)
            .attr("name", ctx.canonical_name())
            .attr("role_arn", Expr::raw("var.cluster_role_arn"))
            .attr(
                "version",
                ctx.string(attrs::KUBERNETES_VERSION)?
                    .unwrap_or_else(|| DEFAULT_KUBERNETES_VERSION.to_string()),
            )
            .blank()
            .block(
                Block::new("vpc_config")
                    .attr("subnet_ids", Expr::raw("var.subnet_ids"))
                    .attr(
                        "endpoint_private_access",
                        ctx.bool(attrs::PRIVATE_ENDPOINT)?.unwrap_or(false),
                    )
                    .attr(
                        "endpoint_public_access",
                        ctx.bool("public_endpoint")?.unwrap_or(false),
                    ),
            );
        if encrypted {
            cluster = cluster.blank().block(
                Block::new("encryption_config")
                    .attr("resources", Expr::string_list(["secrets"]))
                    .blank()
                    .block(Block::new("provider").attr("key_arn", Expr::raw("var.kms_key_arn"))),
            );
        }
        let cluster = cluster.blank().attr("tags", ctx.tags_expr());

        let node_group = Block::resource("aws_eks_node_group", &format!("{}_default", name))
            .attr("cluster_name", Expr::raw(format!("aws_eks_cluster.{}.name", name)))
            .attr("node_group_name", format!("{}-default", ctx.canonical_name()))
            .attr("node_role_arn", Expr::raw("var.node_role_arn"))
            .attr("subnet_ids", Expr::raw("var.subnet_ids"))
            .attr("instance_types", Expr::string_list(instance_types))
            .blank()
            .block(
                Block::new("scaling_config")
                    .attr("desired_size", node_count)
                    .attr("min_size", min_nodes)
                    .attr("max_size", max_nodes),
            )
            .blank()
            .attr("tags", ctx.tags_expr());

        Ok(document(Some(&header(ctx)), &[cluster, node_group]))
    }

    fn variables(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let mut blocks = vec![
            region_variable(ctx),
            variable(
                "cluster_role_arn",
                "IAM role assumed by the EKS control plane",
                "string",
                None,
            ),
            variable("node_role_arn", "IAM role assumed by worker nodes", "string", None),
            variable(
                "subnet_ids",
                "Subnets for the control plane and nodes",
                "list(string)",
                None,
            ),
        ];
        if ctx.bool(attrs::ENCRYPTED)?.unwrap_or(false) {
            blocks.push(variable(
                "kms_key_arn",
                "KMS key used for secrets encryption",
                "string",
                None,
            ));
        }
        Ok(document(None, &blocks))
    }

    fn outputs(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let name = ctx.local_name();
        Ok(document(
            None,
            &[
                output(
                    "cluster_name",
                    "Name of the cluster",
                    format!("aws_eks_cluster.{}.name", name),
                ),
                output(
                    "cluster_endpoint",
                    "Kubernetes API endpoint",
                    format!("aws_eks_cluster.{}.endpoint", name),
                ),
                output(
                    "cluster_arn",
                    "ARN of the cluster",
                    format!("aws_eks_cluster.{}.arn", name),
                ),
                output(
                    "node_group_arn",
                    "ARN of the default node group",
                    format!("aws_eks_node_group.{}_default.arn", name),
                ),
            ],
        ))
    }
}
