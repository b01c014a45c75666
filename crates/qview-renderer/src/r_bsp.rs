// r_bsp.rs - locating a point in the BSP tree

use qview_common::level::checked_index;
use qview_common::q_shared::{dot_product, Vec3};
use qview_common::{MapData, QError, QResult};

/// Returns the leaf containing `p`.
///
/// Walks from the root node, taking the front child when the point is
/// strictly in front of the splitting plane. The walk is capped at the node
/// count, so a cyclic node graph fails instead of spinning.
pub fn point_in_leaf<M: MapData + ?Sized>(map: &M, p: &Vec3) -> QResult<usize> {
    let num_nodes = map.num_nodes();
    if num_nodes == 0 {
        return Ok(0);
    }

    let mut num = 0usize;
    for _ in 0..num_nodes {
        let node = map.node(num)?;
        let plane = map.plane(checked_index(node.plane_num as i64, "plane")?)?;

        let child = if dot_product(p, &plane.normal) > plane.dist {
            node.children[0]
        } else {
            node.children[1]
        };

        if child < 0 {
            let leaf = !(child as i32) as usize;
            map.leaf(leaf)?;
            return Ok(leaf);
        }
        num = child as usize;
    }

    Err(QError::CorruptData(format!(
        "BSP walk exceeded {} nodes without reaching a leaf",
        num_nodes
    )))
}
