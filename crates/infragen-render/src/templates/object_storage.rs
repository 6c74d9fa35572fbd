//! S3 bucket template.

use super::common::{header, output, region_variable, variable};
use crate::context::{RenderContext, attrs};
use crate::error::RenderError;
use crate::hcl::{Block, Expr, document};
use crate::registry::ResourceTemplate;
use infragen_core::ResourceType;

const DEFAULT_ALGORITHM: &str = "AES256";
const KMS_ALGORITHM: &str = "aws:kms";

/// Object storage rendered as an S3 bucket with companion resources for
/// versioning, encryption, public access blocking and expiry.
pub struct ObjectStorageTemplate;

impl ObjectStorageTemplate {
    fn algorithm(ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        Ok(ctx
            .string(attrs::ENCRYPTION_ALGORITHM)?
            .unwrap_or_else(|| DEFAULT_ALGORITHM.to_string()))
    }
}

impl ResourceTemplate for ObjectStorageTemplate {
    fn resource_type(&self) -> ResourceType {
        ResourceType::object_storage()
    }

    fn main(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let name = ctx.local_name();
        let bucket_ref = format!("aws_s3_bucket.{}.id", name);

        let mut blocks = vec![
            Block::resource("aws_s3_bucket", name)
                .attr("bucket", ctx.canonical_name())
                .attr(
                    "force_destroy",
                    ctx.bool("force_destroy")?.unwrap_or(false),
                )
                .blank()
                .attr("tags", ctx.tags_expr()),
        ];

        if ctx.bool(attrs::VERSIONING)?.unwrap_or(false) {
            blocks.push(
                Block::resource("aws_s3_bucket_versioning", name)
                    .attr("bucket", Expr::raw(&bucket_ref))
                    .blank()
                    .block(Block::new("versioning_configuration").attr("status", "Enabled")),
            );
        }

        if ctx.bool(attrs::ENCRYPTED)?.unwrap_or(false) {
            let algorithm = Self::algorithm(ctx)?;
            let mut default = Block::new("apply_server_side_encryption_by_default")
                .attr("sse_algorithm", algorithm.as_str());
            if algorithm == KMS_ALGORITHM {
                default = default.attr("kms_master_key_id", Expr::raw("var.kms_key_arn"));
            }
            blocks.push(
                Block::resource("aws_s3_bucket_server_side_encryption_configuration", name)
                    .attr("bucket", Expr::raw(&bucket_ref))
                    .blank()
                    .block(
                        Block::new("rule")
                            .block(default)
                            .attr("bucket_key_enabled", true),
                    ),
            );
        }

        if ctx.bool(attrs::PUBLIC_ACCESS_BLOCK)?.unwrap_or(false) {
            blocks.push(
                Block::resource("aws_s3_bucket_public_access_block", name)
                    .attr("bucket", Expr::raw(&bucket_ref))
                    .attr("block_public_acls", true)
                    .attr("block_public_policy", true)
                    .attr("ignore_public_acls", true)
                    .attr("restrict_public_buckets", true),
            );
        }

        if let Some(days) = ctx.u64("retention_days")? {
            blocks.push(
                Block::resource("aws_s3_bucket_lifecycle_configuration", name)
                    .attr("bucket", Expr::raw(&bucket_ref))
                    .blank()
                    .block(
                        Block::new("rule")
                            .attr("id", format!("expire-after-{}-days", days))
                            .attr("status", "Enabled")
                            .blank()
                            .block(Block::new("filter"))
                            .blank()
                            .block(Block::new("expiration").attr("days", days)),
                    ),
            );
        }

        Ok(document(Some(&header(ctx)), &blocks))
    }

    fn variables(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let mut blocks = vec![region_variable(ctx)];
        if ctx.bool(attrs::ENCRYPTED)?.unwrap_or(false) && Self::algorithm(ctx)? == KMS_ALGORITHM {
            blocks.push(variable(
                "kms_key_arn",
                "KMS key used for bucket encryption",
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
                output("bucket_id", "Name of the bucket", format!("aws_s3_bucket.{}.id", name)),
                output("bucket_arn", "ARN of the bucket", format!("aws_s3_bucket.{}.arn", name)),
                output(
                    "bucket_regional_domain_name",
                    "Regional domain name of the bucket",
                    format!("aws_s3_bucket.{}.bucket_regional_domain_name", name),
                ),
            ],
        ))
    }
}
