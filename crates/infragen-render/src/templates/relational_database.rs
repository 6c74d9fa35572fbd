//! RDS instance template.

use super::common::{header, output, region_variable, variable};
use crate::context::{RenderContext, attrs};
use crate::error::RenderError;
use crate::hcl::{Block, Expr, document};
use crate::registry::ResourceTemplate;
use infragen_core::ResourceType;

const DEFAULT_ENGINE: &str = "postgres";
const DEFAULT_INSTANCE_CLASS: &str = "db.t3.medium";

pub struct RelationalDatabaseTemplate;

impl ResourceTemplate for RelationalDatabaseTemplate {
    fn resource_type(&self) -> ResourceType {
        ResourceType::relational_database()
    }

    fn required_attributes(&self) -> &'static [&'static str] {
        &["storage_gb"]
    }

    fn main(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let production = ctx.environment().is_production();
        let engine = ctx
            .string(attrs::ENGINE)?
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());
        let skip_final_snapshot = ctx
            .bool("skip_final_snapshot")?
            .unwrap_or(!production);

        let instance = Block::resource("aws_db_instance", ctx.local_name())
            .attr("identifier", ctx.canonical_name())
            .attr("engine", engine)
            .attr_opt("engine_version", ctx.string(attrs::ENGINE_VERSION)?)
            .attr(
                "instance_class",
                ctx.string("instance_class")?
                    .unwrap_or_else(|| DEFAULT_INSTANCE_CLASS.to_string()),
            )
            .attr_opt("db_name", ctx.string("database_name")?)
            .blank()
            .attr("allocated_storage", ctx.require_u64("storage_gb")?)
            .attr_opt("max_allocated_storage", ctx.u64("max_storage_gb")?)
            .attr("storage_type", ctx.string("storage_type")?.unwrap_or_else(|| "gp3".to_string()))
            .attr("storage_encrypted", ctx.bool(attrs::ENCRYPTED)?.unwrap_or(false))
            .blank()
            .attr("backup_retention_period", ctx.u64(attrs::BACKUP_DAYS)?.unwrap_or(0))
            .attr("backup_window", "03:00-04:00")
            .attr("maintenance_window", "sun:04:00-sun:05:00")
            .blank()
            .attr("multi_az", ctx.bool("multi_az")?.unwrap_or(production))
            .attr("publicly_accessible", ctx.bool("publicly_accessible")?.unwrap_or(false))
            .attr(
                "deletion_protection",
                ctx.bool("deletion_protection")?.unwrap_or(production),
            )
            .attr("skip_final_snapshot", skip_final_snapshot)
            .attr_opt(
                "final_snapshot_identifier",
                (!skip_final_snapshot).then(|| format!("{}-final", ctx.canonical_name())),
            )
            .blank()
            .attr("username", Expr::raw("var.master_username"))
            .attr("manage_master_user_password", true)
            .attr("db_subnet_group_name", Expr::raw("var.db_subnet_group_name"))
            .attr("vpc_security_group_ids", Expr::raw("var.vpc_security_group_ids"))
            .blank()
            .attr("tags", ctx.tags_expr());

        Ok(document(Some(&header(ctx)), &[instance]))
    }

    fn variables(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        Ok(document(
            None,
            &[
                region_variable(ctx),
                variable(
                    "master_username",
                    "Master username for the database",
                    "string",
                    Some("dbadmin".into()),
                ),
                variable(
                    "db_subnet_group_name",
                    "Subnet group the instance is placed in",
                    "string",
                    None,
                ),
                variable(
                    "vpc_security_group_ids",
                    "Security groups attached to the instance",
                    "list(string)",
                    None,
                ),
            ],
        ))
    }

    fn outputs(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let name = ctx.local_name();
        Ok(document(
            None,
            &[
                output(
                    "db_instance_id",
                    "Identifier of the database instance",
                    format!("aws_db_instance.{}.id", name),
                ),
                output(
                    "db_endpoint",
                    "Connection endpoint",
                    format!("aws_db_instance.{}.endpoint", name),
                ),
                output(
                    "db_arn",
                    "ARN of the database instance",
                    format!("aws_db_instance.{}.arn", name),
                ),
                output(
                    "master_user_secret_arn",
                    "Secrets Manager secret holding the master password",
                    format!("aws_db_instance.{}.master_user_secret[0].secret_arn", name),
                ),
            ],
        ))
    }
}
