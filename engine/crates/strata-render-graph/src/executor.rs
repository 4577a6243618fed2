//! 编译与执行
//!
//! `compile` 按 pass 添加的顺序解析物理资源并计算 barrier，此时还没有录制任何命令；
//! `execute` 依次录制 barrier 与 pass 回调，最后补上导出资源的 barrier。

use ash::vk;
use itertools::Itertools;
use strata_gfx::basic::color::LabelColor;
use strata_gfx::commands::command_encoder::GfxCommandEncoder;
use strata_gfx::device::GfxDevice;
use strata_gfx::error::GfxResult;
use strata_gfx::resources::image::image_aspect_mask_from_format;
use strata_render_interface::gfx_resource_manager::GfxResourceManager;
use strata_render_interface::handles::{GfxBufferHandle, GfxImageHandle};

use crate::access::RgAccessType;
use crate::barrier::{RgBufferBarrierDesc, RgImageBarrierDesc, RgPassBarriers};
use crate::error::{RgError, RgResult};
use crate::graph::RenderGraph;
use crate::pass::{RgPassContext, RgPassNode};
use crate::resource::{RgPhysicalResource, RgResourceDesc, RgResourceEntry, RgResourceSource};
use crate::resource_handle::{RgBuffer, RgExportedHandle, RgImage, RgRawHandle, RgResourceKind};
use crate::resource_state::RgResourceState;
use crate::temporal::TemporalResourceTable;
use crate::transient_cache::TransientResourceCache;

/// 编译和执行时需要的外部对象，全部由 renderer 持有
pub struct RgResourceContext<'r> {
    pub device: &'r mut dyn GfxDevice,
    pub resource_manager: &'r mut GfxResourceManager,
    pub transient_cache: &'r mut TransientResourceCache,
    pub temporal_table: &'r mut TemporalResourceTable,
    /// 当前帧号，用于 temporal 资源重建时的延迟销毁
    pub frame_id: u64,
}

/// 每个资源被访问时隐含的 usage
#[derive(Clone, Copy, Default)]
struct RgInferredUsage {
    image: vk::ImageUsageFlags,
    buffer: vk::BufferUsageFlags,
}

/// 编译期间的资源解析与状态跟踪
struct RgBarrierPlanner<'g> {
    graph_id: u32,
    resources: &'g [RgResourceEntry],
    inferred_usage: Vec<RgInferredUsage>,

    physical: Vec<Option<RgPhysicalResource>>,
    states: Vec<RgResourceState>,
    /// 本次构建从 transient cache 取出的资源，以及取出时用的描述
    transients: Vec<(RgResourceDesc, RgPhysicalResource)>,
}
impl<'g> RgBarrierPlanner<'g> {
    fn new(graph_id: u32, resources: &'g [RgResourceEntry], inferred_usage: Vec<RgInferredUsage>) -> Self {
        Self {
            graph_id,
            resources,
            inferred_usage,
            physical: vec![None; resources.len()],
            states: vec![RgResourceState::UNDEFINED; resources.len()],
            transients: Vec::new(),
        }
    }

    /// 处理一次访问：第一次遇到的资源先解析到物理资源，然后与上一次访问比较
    fn access(
        &mut self,
        ctx: &mut RgResourceContext<'_>,
        pass_name: &str,
        handle: RgRawHandle,
        access: RgAccessType,
        aspect: Option<vk::ImageAspectFlags>,
        barriers: &mut RgPassBarriers,
    ) -> RgResult<()> {
        let index = handle.index();
        let resources = self.resources;
        let Some(entry) = resources.get(index) else {
            return Err(RgError::InvalidHandle {
                handle,
                reason: "resource index out of range",
            });
        };
        if handle.graph_id != self.graph_id {
            return Err(RgError::InvalidHandle {
                handle,
                reason: "handle belongs to another graph build",
            });
        }

        if self.physical[index].is_none() {
            let (physical, initial_access) =
                self.resolve(ctx, index).map_err(|source| RgError::ResourceCreationFailure {
                    pass: pass_name.to_string(),
                    resource: entry.name.clone(),
                    desc: format!("{:?}", entry.desc),
                    source,
                })?;
            self.physical[index] = Some(physical);
            self.states[index] = RgResourceState::new(initial_access);
        }

        let kind = entry.kind();
        let Some(transition) = self.states[index].transition(access, kind) else {
            return Ok(());
        };
        match &entry.desc {
            RgResourceDesc::Image(desc) => {
                let aspect = aspect.unwrap_or_else(|| image_aspect_mask_from_format(desc.format));
                barriers.add_image_barrier(RgImageBarrierDesc::new(index, transition, aspect));
            }
            RgResourceDesc::Buffer(_) => {
                barriers.add_buffer_barrier(RgBufferBarrierDesc::new(index, transition));
            }
        }
        Ok(())
    }

    fn resolve(&mut self, ctx: &mut RgResourceContext<'_>, index: usize) -> GfxResult<(RgPhysicalResource, RgAccessType)> {
        let resources = self.resources;
        let entry = &resources[index];
        match &entry.source {
            RgResourceSource::Created => {
                let usage = self.inferred_usage[index];
                let desc = entry.desc.with_inferred_usage(usage.image, usage.buffer);
                let physical = ctx.transient_cache.acquire(&desc, &entry.name, ctx.device, ctx.resource_manager)?;
                self.transients.push((desc, physical));
                Ok((physical, RgAccessType::Nothing))
            }
            RgResourceSource::Imported { physical, access } => Ok((*physical, *access)),
            RgResourceSource::Temporal { key } => {
                let usage = self.inferred_usage[index];
                let desc = entry.desc.with_inferred_usage(usage.image, usage.buffer);
                ctx.temporal_table.get_or_create(
                    key,
                    &desc,
                    ctx.transient_cache,
                    ctx.device,
                    ctx.resource_manager,
                    ctx.frame_id,
                )
            }
        }
    }

    /// 放弃本次构建：取出的 transient 资源原样还回去，它们从未被 GPU 使用
    fn abandon(self, ctx: &mut RgResourceContext<'_>) {
        for (desc, physical) in self.transients {
            ctx.transient_cache.release(desc, physical, ctx.frame_id);
        }
    }
}

impl<'a> RenderGraph<'a> {
    /// 解析所有资源并计算 barrier
    ///
    /// 资源创建失败时，已经取出的 transient 资源全部还给 cache，本帧应当被跳过。
    pub fn compile(self, ctx: &mut RgResourceContext<'_>) -> RgResult<CompiledRenderGraph<'a>> {
        let _span = strata_crate_tools::profile_span!("RenderGraph::compile");

        let RenderGraph {
            graph_id,
            resources,
            passes,
            exports,
            label_passes,
            ..
        } = self;

        let inferred_usage = Self::infer_usage(&resources, &passes, &exports);
        let mut planner = RgBarrierPlanner::new(graph_id, &resources, inferred_usage);

        let mut pass_barriers = Vec::with_capacity(passes.len());
        for pass in &passes {
            let mut barriers = RgPassBarriers::new();
            for access in &pass.accesses {
                if let Err(err) =
                    planner.access(ctx, &pass.name, access.handle, access.access, access.aspect, &mut barriers)
                {
                    planner.abandon(ctx);
                    return Err(err);
                }
            }
            pass_barriers.push(barriers);
        }

        let mut export_barriers = RgPassBarriers::new();
        for (handle, access) in &exports {
            if let Err(err) = planner.access(ctx, "<export>", *handle, *access, None, &mut export_barriers) {
                planner.abandon(ctx);
                return Err(err);
            }
        }

        let RgBarrierPlanner {
            physical,
            states,
            transients,
            ..
        } = planner;

        log::trace!(
            "render graph g{} compiled: {} passes, {} resources, {} transients",
            graph_id,
            passes.len(),
            resources.len(),
            transients.len()
        );

        Ok(CompiledRenderGraph {
            graph_id,
            frame_id: ctx.frame_id,
            resources,
            passes,
            physical,
            final_states: states,
            pass_barriers,
            export_barriers,
            transients,
            label_passes,
        })
    }

    /// `compile` 之后立即 `execute`
    pub fn execute(
        self,
        ctx: &mut RgResourceContext<'_>,
        encoder: &mut dyn GfxCommandEncoder,
    ) -> RgResult<RetiredRenderGraph> {
        self.compile(ctx)?.execute(ctx, encoder)
    }

    /// 汇总所有访问（包括导出）隐含的 usage
    fn infer_usage(
        resources: &[RgResourceEntry],
        passes: &[RgPassNode<'_>],
        exports: &[(RgRawHandle, RgAccessType)],
    ) -> Vec<RgInferredUsage> {
        let mut usage = vec![RgInferredUsage::default(); resources.len()];
        let accesses = passes
            .iter()
            .flat_map(|pass| pass.accesses.iter().map(|access| (access.handle, access.access)))
            .chain(exports.iter().copied());
        for (handle, access) in accesses {
            if let Some(usage) = usage.get_mut(handle.index()) {
                usage.image |= access.image_usage();
                usage.buffer |= access.buffer_usage();
            }
        }
        usage
    }
}

/// 编译完成、尚未录制的渲染图
pub struct CompiledRenderGraph<'a> {
    graph_id: u32,
    frame_id: u64,
    resources: Vec<RgResourceEntry>,
    passes: Vec<RgPassNode<'a>>,

    physical: Vec<Option<RgPhysicalResource>>,
    /// 所有访问（包括导出）结束后每个资源的状态
    final_states: Vec<RgResourceState>,

    pass_barriers: Vec<RgPassBarriers>,
    export_barriers: RgPassBarriers,
    transients: Vec<(RgResourceDesc, RgPhysicalResource)>,

    label_passes: bool,
}
// getters
impl CompiledRenderGraph<'_> {
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_name(&self, index: usize) -> &str {
        &self.passes[index].name
    }

    /// pass 之前需要的 barrier
    pub fn pass_barriers(&self, index: usize) -> &RgPassBarriers {
        &self.pass_barriers[index]
    }

    /// 最后一个 pass 之后为导出补的 barrier
    pub fn export_barriers(&self) -> &RgPassBarriers {
        &self.export_barriers
    }

    /// 本次构建从 transient cache 取出的资源数量
    #[inline]
    pub fn transient_count(&self) -> usize {
        self.transients.len()
    }

    fn resource_name(&self, index: usize) -> &str {
        self.resources.get(index).map_or("<unknown>", |entry| entry.name.as_str())
    }
}
// execute
impl CompiledRenderGraph<'_> {
    /// 录制所有 pass
    ///
    /// 任何一个 pass 失败，本帧被放弃，transient 资源立即还给 cache，temporal 资源的状态保持不变。
    pub fn execute(
        mut self,
        ctx: &mut RgResourceContext<'_>,
        encoder: &mut dyn GfxCommandEncoder,
    ) -> RgResult<RetiredRenderGraph> {
        let _span = strata_crate_tools::profile_span!("CompiledRenderGraph::execute");

        let passes = std::mem::take(&mut self.passes);
        if let Err(err) = self.record(passes, &*ctx.resource_manager, encoder) {
            for (desc, physical) in self.transients.drain(..) {
                ctx.transient_cache.release(desc, physical, ctx.frame_id);
            }
            return Err(err);
        }

        // 记录 temporal 资源最终的访问，下一帧从这里接着跟踪
        for (index, entry) in self.resources.iter().enumerate() {
            if let (RgResourceSource::Temporal { key }, Some(_)) = (&entry.source, self.physical[index]) {
                ctx.temporal_table.set_access(key, self.final_states[index].access());
            }
        }

        Ok(RetiredRenderGraph {
            graph_id: self.graph_id,
            frame_id: self.frame_id,
            physical: self.physical,
            transients: self.transients,
        })
    }

    fn record(
        &self,
        passes: Vec<RgPassNode<'_>>,
        resource_manager: &GfxResourceManager,
        encoder: &mut dyn GfxCommandEncoder,
    ) -> RgResult<()> {
        for (pass_index, pass) in passes.into_iter().enumerate() {
            self.record_barriers(&self.pass_barriers[pass_index], resource_manager, encoder)?;

            if self.label_passes {
                encoder.begin_label(&pass.name, LabelColor::COLOR_PASS);
            }
            let result = match pass.render_fn {
                Some(render_fn) => {
                    let mut pass_ctx = RgPassContext {
                        encoder: &mut *encoder,
                        resource_manager,
                        physical: &self.physical,
                        pass_name: &pass.name,
                    };
                    render_fn(&mut pass_ctx)
                }
                None => Ok(()),
            };
            if self.label_passes {
                encoder.end_label();
            }

            result.map_err(|source| RgError::PassFailed {
                pass: pass.name.clone(),
                source,
            })?;
        }

        self.record_barriers(&self.export_barriers, resource_manager, encoder)
    }

    /// 录制 barriers
    fn record_barriers(
        &self,
        barriers: &RgPassBarriers,
        resource_manager: &GfxResourceManager,
        encoder: &mut dyn GfxCommandEncoder,
    ) -> RgResult<()> {
        for batch in barriers.image_barrier_batches() {
            let image_barriers = batch
                .iter()
                .map(|desc| {
                    let image = self
                        .physical_image(desc.resource_index)
                        .and_then(|handle| resource_manager.get_image(handle))
                        .ok_or_else(|| self.unresolved(desc.resource_index))?;
                    Ok(desc.to_gfx_barrier(image.handle()))
                })
                .collect::<RgResult<Vec<_>>>()?;
            encoder.image_memory_barrier(vk::DependencyFlags::empty(), &image_barriers);
        }

        for batch in barriers.buffer_barrier_batches() {
            let buffer_barriers = batch
                .iter()
                .map(|desc| {
                    let buffer = self
                        .physical_buffer(desc.resource_index)
                        .and_then(|handle| resource_manager.get_buffer(handle))
                        .ok_or_else(|| self.unresolved(desc.resource_index))?;
                    Ok(desc.to_gfx_barrier(buffer.handle()))
                })
                .collect::<RgResult<Vec<_>>>()?;
            encoder.buffer_memory_barrier(vk::DependencyFlags::empty(), &buffer_barriers);
        }

        Ok(())
    }

    fn physical_image(&self, index: usize) -> Option<GfxImageHandle> {
        self.physical.get(index).copied().flatten().and_then(|physical| physical.image())
    }

    fn physical_buffer(&self, index: usize) -> Option<GfxBufferHandle> {
        self.physical.get(index).copied().flatten().and_then(|physical| physical.buffer())
    }

    fn unresolved(&self, index: usize) -> RgError {
        RgError::InvalidHandle {
            handle: RgRawHandle {
                graph_id: self.graph_id,
                index: index as u32,
                version: self.resources.get(index).map_or(0, |entry| entry.version),
            },
            reason: "physical resource is missing",
        }
    }
}
// 调试方法
impl CompiledRenderGraph<'_> {
    /// 打印执行计划
    ///
    /// 每个 pass 的访问（包含资源名称）以及 pass 之前的 barrier 详细信息。
    pub fn print_execution_plan(&self) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              RenderGraph Execution Plan                          ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Frame: {}  |  Passes: {}  |  Order: [{}]",
            self.frame_id,
            self.passes.len(),
            self.passes.iter().map(|pass| pass.name.as_str()).join(" → ")
        );
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for (pass_index, pass) in self.passes.iter().enumerate() {
            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ [{}/{}] Pass: \"{}\"", pass_index + 1, self.passes.len(), pass.name);
            log::info!("├─────────────────────────────────────────────────────────────────┤");

            for access in &pass.accesses {
                let info = access.access.info();
                log::info!(
                    "│   {} \"{}\" {:?} (stage: {}, access: {})",
                    if info.is_write { "✏️ " } else { "📖" },
                    self.resource_name(access.handle.index()),
                    access.access,
                    Self::format_pipeline_stage(info.stage_mask),
                    Self::format_access_flags(info.access_mask)
                );
            }

            self.print_barriers(&self.pass_barriers[pass_index]);
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        if self.export_barriers.has_barriers() {
            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ Exports");
            self.print_barriers(&self.export_barriers);
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        log::info!("");
        log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
    }

    fn print_barriers(&self, barriers: &RgPassBarriers) {
        if !barriers.has_barriers() {
            log::info!("│ No barriers required");
            return;
        }

        log::info!("├─────────────────────────────────────────────────────────────────┤");
        log::info!(
            "│ Barriers: {} image, {} buffer",
            barriers.image_barrier_count(),
            barriers.buffer_barrier_count()
        );

        for barrier in &barriers.image_barriers {
            let t = &barrier.transition;
            let layout_change = if t.has_layout_change() {
                format!("{:?} → {:?}", t.old_layout, t.new_layout)
            } else {
                format!("{:?} (no layout change)", t.old_layout)
            };
            log::info!("│   🔒 Image \"{}\":", self.resource_name(barrier.resource_index));
            log::info!("│       Layout: {}", layout_change);
            log::info!(
                "│       Stage:  {} → {}",
                Self::format_pipeline_stage(t.src_stage),
                Self::format_pipeline_stage(t.dst_stage)
            );
            log::info!(
                "│       Access: {} → {}",
                Self::format_access_flags(t.src_access),
                Self::format_access_flags(t.dst_access)
            );
            log::info!("│       Aspect: {:?}", barrier.aspect);
        }

        for barrier in &barriers.buffer_barriers {
            let t = &barrier.transition;
            log::info!("│   🔒 Buffer \"{}\":", self.resource_name(barrier.resource_index));
            log::info!(
                "│       Stage:  {} → {}",
                Self::format_pipeline_stage(t.src_stage),
                Self::format_pipeline_stage(t.dst_stage)
            );
            log::info!(
                "│       Access: {} → {}",
                Self::format_access_flags(t.src_access),
                Self::format_access_flags(t.dst_access)
            );
        }
    }

    /// 格式化 PipelineStageFlags2 为可读字符串
    fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
        type S = vk::PipelineStageFlags2;
        const NAMES: &[(S, &str)] = &[
            (S::TOP_OF_PIPE, "TOP_OF_PIPE"),
            (S::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
            (S::DRAW_INDIRECT, "DRAW_INDIRECT"),
            (S::VERTEX_INPUT, "VERTEX_INPUT"),
            (S::VERTEX_SHADER, "VERTEX_SHADER"),
            (S::TESSELLATION_CONTROL_SHADER, "TESS_CONTROL"),
            (S::TESSELLATION_EVALUATION_SHADER, "TESS_EVALUATION"),
            (S::GEOMETRY_SHADER, "GEOMETRY_SHADER"),
            (S::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
            (S::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
            (S::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
            (S::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
            (S::COMPUTE_SHADER, "COMPUTE_SHADER"),
            (S::TRANSFER, "TRANSFER"),
            (S::HOST, "HOST"),
            (S::RAY_TRACING_SHADER_KHR, "RAY_TRACING_SHADER"),
            (S::ACCELERATION_STRUCTURE_BUILD_KHR, "ACCEL_STRUCT_BUILD"),
            (S::COMMAND_PREPROCESS_NV, "COMMAND_PREPROCESS"),
            (S::ALL_GRAPHICS, "ALL_GRAPHICS"),
            (S::ALL_COMMANDS, "ALL_COMMANDS"),
        ];

        if stage == S::NONE {
            return "NONE".to_string();
        }
        let names = NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).join(" | ");
        if names.is_empty() { format!("{:?}", stage) } else { names }
    }

    /// 格式化 AccessFlags2 为可读字符串
    fn format_access_flags(access: vk::AccessFlags2) -> String {
        type A = vk::AccessFlags2;
        const NAMES: &[(A, &str)] = &[
            (A::INDIRECT_COMMAND_READ, "INDIRECT_CMD_READ"),
            (A::INDEX_READ, "INDEX_READ"),
            (A::VERTEX_ATTRIBUTE_READ, "VERTEX_ATTR_READ"),
            (A::UNIFORM_READ, "UNIFORM_READ"),
            (A::INPUT_ATTACHMENT_READ, "INPUT_ATTACH_READ"),
            (A::SHADER_READ, "SHADER_READ"),
            (A::SHADER_WRITE, "SHADER_WRITE"),
            (A::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
            (A::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
            (A::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
            (A::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
            (A::TRANSFER_READ, "TRANSFER_READ"),
            (A::TRANSFER_WRITE, "TRANSFER_WRITE"),
            (A::HOST_READ, "HOST_READ"),
            (A::HOST_WRITE, "HOST_WRITE"),
            (A::MEMORY_READ, "MEMORY_READ"),
            (A::MEMORY_WRITE, "MEMORY_WRITE"),
            (A::ACCELERATION_STRUCTURE_READ_KHR, "ACCEL_STRUCT_READ"),
            (A::ACCELERATION_STRUCTURE_WRITE_KHR, "ACCEL_STRUCT_WRITE"),
            (A::COMMAND_PREPROCESS_READ_NV, "COMMAND_PREPROCESS_READ"),
            (A::COMMAND_PREPROCESS_WRITE_NV, "COMMAND_PREPROCESS_WRITE"),
        ];

        if access == A::NONE {
            return "NONE".to_string();
        }
        let names = NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).join(" | ");
        if names.is_empty() { format!("{:?}", access) } else { names }
    }
}

/// 已经录制完成的渲染图
///
/// 持有本帧的 transient 资源，直到所在帧退休后调用 `release_resources` 还给 cache。
#[must_use = "transient resources are only returned to the cache by release_resources()"]
pub struct RetiredRenderGraph {
    graph_id: u32,
    frame_id: u64,
    physical: Vec<Option<RgPhysicalResource>>,
    transients: Vec<(RgResourceDesc, RgPhysicalResource)>,
}
impl RetiredRenderGraph {
    /// 录制时的帧号
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn transient_count(&self) -> usize {
        self.transients.len()
    }

    pub fn exported_image(&self, handle: RgExportedHandle<RgImage>) -> RgResult<GfxImageHandle> {
        self.exported(handle.raw, RgResourceKind::Image)?.image().ok_or(RgError::InvalidHandle {
            handle: handle.raw,
            reason: "not an image",
        })
    }

    pub fn exported_buffer(&self, handle: RgExportedHandle<RgBuffer>) -> RgResult<GfxBufferHandle> {
        self.exported(handle.raw, RgResourceKind::Buffer)?.buffer().ok_or(RgError::InvalidHandle {
            handle: handle.raw,
            reason: "not a buffer",
        })
    }

    /// 所在帧退休之后，把 transient 资源还给 cache
    pub fn release_resources(self, transient_cache: &mut TransientResourceCache, frame_id: u64) {
        for (desc, physical) in self.transients {
            transient_cache.release(desc, physical, frame_id);
        }
    }

    fn exported(&self, handle: RgRawHandle, kind: RgResourceKind) -> RgResult<RgPhysicalResource> {
        if handle.graph_id != self.graph_id {
            return Err(RgError::InvalidHandle {
                handle,
                reason: "handle belongs to another graph build",
            });
        }
        self.physical
            .get(handle.index())
            .copied()
            .flatten()
            .filter(|physical| physical.kind() == kind)
            .ok_or(RgError::InvalidHandle {
                handle,
                reason: "exported resource was not resolved",
            })
    }
}
