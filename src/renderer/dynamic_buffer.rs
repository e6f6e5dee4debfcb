use super::resource_manager::generate_resource_id;

const MIN_CAPACITY: u64 = 256;

/// 可自动扩容的 GPU Buffer
///
/// 职责：
/// 1. 每次写入时检查容量，不足则按 2 的幂重建
/// 2. 每次重建分配新的 `id`，依赖它的 BindGroup 据此判断是否需要重建
pub struct DynamicBuffer {
    label: String,
    usage: wgpu::BufferUsages,
    buffer: wgpu::Buffer,
    capacity: u64,
    len: u64,
    id: u64,
}

impl DynamicBuffer {
    pub fn new(device: &wgpu::Device, label: &str, usage: wgpu::BufferUsages, initial_capacity: u64) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let capacity = initial_capacity.max(MIN_CAPACITY).next_power_of_two();
        let buffer = Self::create(device, label, usage, capacity);
        Self {
            label: label.to_string(),
            usage,
            buffer,
            capacity,
            len: 0,
            id: generate_resource_id(),
        }
    }

    fn create(device: &wgpu::Device, label: &str, usage: wgpu::BufferUsages, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage,
            mapped_at_creation: false,
        })
    }

    /// 上传数据，容量不足时重建 Buffer
    ///
    /// 返回 `true` 表示 Buffer 被重建。
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) -> bool {
        let size = bytes.len() as u64;
        let reallocated = size > self.capacity;
        if reallocated {
            self.capacity = size.next_power_of_two().max(MIN_CAPACITY);
            log::debug!("Resizing buffer '{}' to {} bytes", self.label, self.capacity);
            self.buffer = Self::create(device, &self.label, self.usage, self.capacity);
            self.id = generate_resource_id();
        }
        self.len = size;
        if size == 0 {
            return reallocated;
        }

        // write_buffer 要求 4 字节对齐
        if size % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            queue.write_buffer(&self.buffer, 0, bytes);
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT) as usize, 0);
            queue.write_buffer(&self.buffer, 0, &padded);
        }
        reallocated
    }

    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bytes written by the last upload.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}
