//! `try`/`catch`/`finally`.
//!
//! Region nesting for a statement with both handlers:
//!
//! ```text
//! TryAndFinally
//! ├── Try
//! │   └── TryAndCatch
//! │       ├── Try      (body)
//! │       ├── Catch
//! │       └── Catch
//! └── Finally
//! ```
//!
//! The body and every catch handler jump to the block after the statement.
//! Handlers are only entered by the exception machinery, so their first
//! blocks have no predecessors. A finally handler that runs to its end
//! leaves through a `StructuredExceptionHandling` edge.

use opal_ir::{OpId, OpKind, OpNode, OpRange};

use crate::builder::{BlockRef, Exit};
use crate::graph::RegionKind;
use crate::FlowError;

use super::Lowerer;

impl Lowerer<'_> {
    pub(super) fn lower_try(
        &mut self,
        body: OpId,
        catches: OpRange,
        finally: OpId,
    ) -> Result<(), FlowError> {
        let input = self.input;
        let catches = input.list(catches);
        let after = self.builder.reserve();

        let finally_group = if finally.is_valid() {
            let group = self.builder.enter_region(RegionKind::TryAndFinally);
            Some((group, self.builder.enter_region(RegionKind::Try)))
        } else {
            None
        };
        let catch_group = if catches.is_empty() {
            None
        } else {
            let group = self.builder.enter_region(RegionKind::TryAndCatch);
            Some((group, self.builder.enter_region(RegionKind::Try)))
        };

        self.lower_stmt(body)?;
        self.close_handler_part(after);

        if let Some((group, protected)) = catch_group {
            self.builder.leave_region(protected)?;
            for &clause in catches {
                self.lower_catch(clause, after)?;
            }
            self.builder.leave_region(group)?;
        }

        if let Some((group, protected)) = finally_group {
            self.builder.leave_region(protected)?;
            let handler = self.builder.enter_region(RegionKind::Finally);
            self.builder.ensure_block();
            self.finally_depth += 1;
            let lowered = self.lower_stmt(finally);
            self.finally_depth -= 1;
            lowered?;
            self.builder.ensure_block();
            if self.builder.is_open() {
                self.builder.terminate(Exit::EndFinally);
            }
            self.builder.leave_region(handler)?;
            self.builder.leave_region(group)?;
        }

        self.builder.place(after);
        Ok(())
    }

    /// End a protected body or catch handler: it must own at least one
    /// block, and falling off its end continues after the statement.
    fn close_handler_part(&mut self, after: BlockRef) {
        self.builder.ensure_block();
        if self.builder.is_open() {
            self.builder.jump(after);
        }
    }

    fn lower_catch(&mut self, clause: OpId, after: BlockRef) -> Result<(), FlowError> {
        let OpKind::CatchClause {
            exception_type,
            local,
            handler,
        } = self.input.kind(clause)
        else {
            return Err(FlowError::Malformed(format!(
                "operation {clause:?} in a catch list is not a catch clause"
            )));
        };
        let region = self.builder.enter_region(RegionKind::Catch);
        self.builder.set_exception_type(region, exception_type);
        // The handler entry must stay free of incoming edges, even when the
        // handler starts with a loop or a label.
        self.builder.ensure_block();

        if let Some(local) = local {
            self.builder.declare_local(region, local);
            let symbol = self.ctx.symbols.local(local);
            let target = self.builder.ops.push(
                OpNode::new(
                    OpKind::LocalReference {
                        local,
                        is_declaration: true,
                    },
                    Some(symbol.ty),
                    symbol.span,
                )
                .implicit(),
            );
            let caught = self.builder.ops.push(
                OpNode::new(OpKind::CaughtException, Some(exception_type), symbol.span)
                    .implicit(),
            );
            let assign = self.builder.ops.push(
                OpNode::new(
                    OpKind::SimpleAssignment {
                        target,
                        value: caught,
                    },
                    None,
                    symbol.span,
                )
                .implicit(),
            );
            self.builder.add_statement(assign);
        }

        self.lower_stmt(handler)?;
        self.close_handler_part(after);
        self.builder.leave_region(region)
    }
}
