//! Files shared by every resource type, plus small block helpers.

use crate::context::RenderContext;
use crate::hcl::{Block, Expr, document};

pub fn provider(ctx: &RenderContext<'_>) -> String {
    let provider = &ctx.policy().provider;
    document(
        None,
        &[
            Block::new("terraform")
                .attr("required_version", provider.terraform_version.as_str())
                .blank()
                .block(Block::new("required_providers").attr(
                    "aws",
                    Expr::Map(vec![
                        ("source".into(), "hashicorp/aws".into()),
                        ("version".into(), provider.version.as_str().into()),
                    ]),
                )),
            Block::new("provider")
                .label("aws")
                .attr("region", Expr::raw("var.aws_region")),
        ],
    )
}

pub fn backend(ctx: &RenderContext<'_>) -> String {
    let policy = ctx.policy();
    document(
        None,
        &[Block::new("terraform").block(
            Block::new("backend")
                .label("s3")
                .attr("bucket", policy.state_bucket())
                .attr("key", format!("{}/terraform.tfstate", ctx.directory_path()))
                .attr("region", policy.backend_region())
                .attr("dynamodb_table", policy.lock_table())
                .attr("encrypt", true),
        )],
    )
}

/// `variable "<name>" { ... }`
pub fn variable(name: &str, description: &str, ty: &str, default: Option<Expr>) -> Block {
    Block::new("variable")
        .label(name)
        .attr("description", description)
        .attr("type", Expr::raw(ty))
        .attr_opt("default", default)
}

/// The region variable every bundle declares.
pub fn region_variable(ctx: &RenderContext<'_>) -> Block {
    variable(
        "aws_region",
        "AWS region to deploy into",
        "string",
        Some(ctx.policy().provider.region.as_str().into()),
    )
}

/// `output "<name>" { ... }`
pub fn output(name: &str, description: &str, value: String) -> Block {
    Block::new("output")
        .label(name)
        .attr("description", description)
        .attr("value", Expr::Raw(value))
}

/// Header comment placed at the top of `main.tf`.
pub fn header(ctx: &RenderContext<'_>) -> String {
    format!(
        "Generated by infragen: {} {} ({}).\nChanges should go through a new provisioning request.",
        ctx.resource_type(),
        ctx.canonical_name(),
        ctx.environment()
    )
}
