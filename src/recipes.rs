/// Static crafting recipe book.
///
/// Recipes are fixed mappings from output name to a slot pattern: 4 slots for
/// the inventory 2x2 grid, 9 for a crafting table. A slot requirement is a
/// name family (substring rules) plus a per-craft count. "Matching material"
/// recipes (a bed needs three wool of the same color) carry a boolean mask;
/// the crafter picks one concrete material and fills every masked slot with it.
use crate::facade::Inventory;
use crate::types::{item_matches, ItemStack};
use lazy_static::lazy_static;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeSlot {
    pub names: Vec<String>,
    pub count: u32,
}

impl RecipeSlot {
    fn of(names: &[&str]) -> Option<Self> {
        Some(Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            count: 1,
        })
    }

    pub fn accepts(&self, item_name: &str) -> bool {
        self.names.iter().any(|n| item_matches(item_name, n))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CraftingRecipe {
    pub output: String,
    pub output_count: u32,
    /// 4 entries for 2x2, 9 for 3x3; `None` is an empty slot.
    pub slots: Vec<Option<RecipeSlot>>,
    /// Slots that must all be filled with the *same* concrete material.
    pub same_material_mask: Option<Vec<bool>>,
}

impl CraftingRecipe {
    /// Needs a crafting table (3x3) rather than the inventory grid.
    pub fn needs_table(&self) -> bool {
        self.slots.len() > 4
    }

    /// Total items of each slot family needed for one craft, merged by the
    /// first name of the family.
    pub fn ingredients_per_craft(&self) -> Vec<(Vec<String>, u32)> {
        let mut merged: Vec<(Vec<String>, u32)> = Vec::new();
        for slot in self.slots.iter().flatten() {
            match merged.iter_mut().find(|(names, _)| *names == slot.names) {
                Some((_, count)) => *count += slot.count,
                None => merged.push((slot.names.clone(), slot.count)),
            }
        }
        merged
    }

    /// True when the inventory holds everything for `crafts` crafts.
    pub fn craftable_from(&self, inventory: &Inventory, crafts: u32) -> bool {
        self.ingredients_per_craft().iter().all(|(names, count)| {
            let have: u32 = inventory
                .stacks()
                .filter(|s| names.iter().any(|n| item_matches(&s.name, n)))
                .map(|s| s.count)
                .sum();
            have >= count * crafts
        })
    }

    /// Pick the concrete material for the masked slots: the first inventory
    /// item accepted by a masked slot with enough total count.
    pub fn choose_masked_material(&self, inventory: &Inventory) -> Option<String> {
        let mask = self.same_material_mask.as_ref()?;
        let needed = mask.iter().filter(|m| **m).count() as u32;
        let slot = self
            .slots
            .iter()
            .zip(mask.iter())
            .find(|(_, m)| **m)
            .and_then(|(s, _)| s.as_ref())?;
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for stack in inventory.stacks() {
            if slot.accepts(&stack.name) {
                *counts.entry(stack.name.as_str()).or_insert(0) += stack.count;
            }
        }
        counts
            .into_iter()
            .filter(|(_, c)| *c >= needed)
            .map(|(n, _)| n.to_string())
            .next()
    }
}

fn recipe(
    output: &str,
    output_count: u32,
    slots: Vec<Option<RecipeSlot>>,
    same_material_mask: Option<Vec<bool>>,
) -> CraftingRecipe {
    CraftingRecipe {
        output: output.to_string(),
        output_count,
        slots,
        same_material_mask,
    }
}

lazy_static! {
    /// Output name -> recipe. The vocabulary is the facade's item names.
    pub static ref RECIPE_BOOK: HashMap<&'static str, CraftingRecipe> = {
        let mut book = HashMap::new();
        let n = || None::<RecipeSlot>;

        book.insert(
            "planks",
            recipe("planks", 4, vec![RecipeSlot::of(&["_log"]), n(), n(), n()], None),
        );
        book.insert(
            "stick",
            recipe(
                "stick",
                4,
                vec![RecipeSlot::of(&["planks"]), n(), RecipeSlot::of(&["planks"]), n()],
                None,
            ),
        );
        book.insert(
            "crafting_table",
            recipe(
                "crafting_table",
                1,
                vec![
                    RecipeSlot::of(&["planks"]),
                    RecipeSlot::of(&["planks"]),
                    RecipeSlot::of(&["planks"]),
                    RecipeSlot::of(&["planks"]),
                ],
                None,
            ),
        );
        book.insert(
            "blaze_powder",
            recipe(
                "blaze_powder",
                2,
                vec![RecipeSlot::of(&["blaze_rod"]), n(), n(), n()],
                None,
            ),
        );
        book.insert(
            "ender_eye",
            recipe(
                "ender_eye",
                1,
                vec![
                    RecipeSlot::of(&["blaze_powder"]),
                    RecipeSlot::of(&["ender_pearl"]),
                    n(),
                    n(),
                ],
                None,
            ),
        );
        book.insert(
            "flint_and_steel",
            recipe(
                "flint_and_steel",
                1,
                vec![RecipeSlot::of(&["iron_ingot"]), n(), n(), RecipeSlot::of(&["flint"])],
                None,
            ),
        );
        book.insert(
            "shears",
            recipe(
                "shears",
                1,
                vec![n(), RecipeSlot::of(&["iron_ingot"]), RecipeSlot::of(&["iron_ingot"]), n()],
                None,
            ),
        );

        // 3x3 recipes.
        book.insert(
            "furnace",
            recipe(
                "furnace",
                1,
                vec![
                    RecipeSlot::of(&["cobblestone"]),
                    RecipeSlot::of(&["cobblestone"]),
                    RecipeSlot::of(&["cobblestone"]),
                    RecipeSlot::of(&["cobblestone"]),
                    n(),
                    RecipeSlot::of(&["cobblestone"]),
                    RecipeSlot::of(&["cobblestone"]),
                    RecipeSlot::of(&["cobblestone"]),
                    RecipeSlot::of(&["cobblestone"]),
                ],
                None,
            ),
        );
        book.insert(
            "wooden_pickaxe",
            recipe(
                "wooden_pickaxe",
                1,
                vec![
                    RecipeSlot::of(&["planks"]),
                    RecipeSlot::of(&["planks"]),
                    RecipeSlot::of(&["planks"]),
                    n(),
                    RecipeSlot::of(&["stick"]),
                    n(),
                    n(),
                    RecipeSlot::of(&["stick"]),
                    n(),
                ],
                None,
            ),
        );
        book.insert(
            "stone_pickaxe",
            recipe(
                "stone_pickaxe",
                1,
                vec![
                    RecipeSlot::of(&["cobblestone"]),
                    RecipeSlot::of(&["cobblestone"]),
                    RecipeSlot::of(&["cobblestone"]),
                    n(),
                    RecipeSlot::of(&["stick"]),
                    n(),
                    n(),
                    RecipeSlot::of(&["stick"]),
                    n(),
                ],
                None,
            ),
        );
        book.insert(
            "stone_sword",
            recipe(
                "stone_sword",
                1,
                vec![
                    n(),
                    RecipeSlot::of(&["cobblestone"]),
                    n(),
                    n(),
                    RecipeSlot::of(&["cobblestone"]),
                    n(),
                    n(),
                    RecipeSlot::of(&["stick"]),
                    n(),
                ],
                None,
            ),
        );
        book.insert(
            "iron_pickaxe",
            recipe(
                "iron_pickaxe",
                1,
                vec![
                    RecipeSlot::of(&["iron_ingot"]),
                    RecipeSlot::of(&["iron_ingot"]),
                    RecipeSlot::of(&["iron_ingot"]),
                    n(),
                    RecipeSlot::of(&["stick"]),
                    n(),
                    n(),
                    RecipeSlot::of(&["stick"]),
                    n(),
                ],
                None,
            ),
        );
        book.insert(
            "iron_sword",
            recipe(
                "iron_sword",
                1,
                vec![
                    n(),
                    RecipeSlot::of(&["iron_ingot"]),
                    n(),
                    n(),
                    RecipeSlot::of(&["iron_ingot"]),
                    n(),
                    n(),
                    RecipeSlot::of(&["stick"]),
                    n(),
                ],
                None,
            ),
        );
        book.insert(
            "bread",
            recipe(
                "bread",
                1,
                vec![
                    n(),
                    n(),
                    n(),
                    RecipeSlot::of(&["wheat"]),
                    RecipeSlot::of(&["wheat"]),
                    RecipeSlot::of(&["wheat"]),
                    n(),
                    n(),
                    n(),
                ],
                None,
            ),
        );
        book.insert(
            "white_bed",
            recipe(
                "white_bed",
                1,
                vec![
                    n(),
                    n(),
                    n(),
                    RecipeSlot::of(&["wool"]),
                    RecipeSlot::of(&["wool"]),
                    RecipeSlot::of(&["wool"]),
                    RecipeSlot::of(&["planks"]),
                    RecipeSlot::of(&["planks"]),
                    RecipeSlot::of(&["planks"]),
                ],
                Some(vec![
                    false, false, false, true, true, true, false, false, false,
                ]),
            ),
        );
        book
    };
}

pub fn recipe_for(output: &str) -> Option<&'static CraftingRecipe> {
    RECIPE_BOOK.get(output)
}

/// Match a grid's contents against the book, for the facade side of craft
/// output computation. 2x2 recipes embed into a 3x3 grid at the top-left.
pub fn match_grid(grid: &[Option<ItemStack>]) -> Option<ItemStack> {
    for recipe in RECIPE_BOOK.values() {
        if grid_matches(recipe, grid) {
            return Some(ItemStack::new(&recipe.output, recipe.output_count));
        }
    }
    None
}

/// Recipe slot index -> grid index mapping for a grid size. 2x2 recipes
/// embed into the top-left corner of a 3x3 grid.
pub fn recipe_grid_indices(recipe: &CraftingRecipe, grid_size: usize) -> Option<Vec<usize>> {
    if recipe.slots.len() == grid_size {
        Some((0..grid_size).collect())
    } else if recipe.slots.len() == 4 && grid_size == 9 {
        Some(vec![0, 1, 3, 4])
    } else {
        None
    }
}

fn grid_matches(recipe: &CraftingRecipe, grid: &[Option<ItemStack>]) -> bool {
    let Some(mapping) = recipe_grid_indices(recipe, grid.len()) else {
        return false;
    };

    let mut used = vec![false; grid.len()];
    for (ri, gi) in mapping.iter().enumerate() {
        used[*gi] = true;
        match (&recipe.slots[ri], &grid[*gi]) {
            (None, None) => {}
            (None, Some(_)) => return false,
            (Some(_), None) => return false,
            (Some(req), Some(stack)) => {
                if !req.accepts(&stack.name) || stack.count < req.count {
                    return false;
                }
            }
        }
    }
    // Any item outside the mapped region breaks the shape.
    for (gi, stack) in grid.iter().enumerate() {
        if !used[gi] && stack.is_some() {
            return false;
        }
    }

    if let Some(mask) = &recipe.same_material_mask {
        let mut material: Option<&str> = None;
        for (ri, gi) in mapping.iter().enumerate() {
            if !mask.get(ri).copied().unwrap_or(false) {
                continue;
            }
            let Some(stack) = &grid[*gi] else {
                return false;
            };
            match material {
                None => material = Some(&stack.name),
                Some(m) if m == stack.name => {}
                _ => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_lookup() {
        assert!(recipe_for("planks").is_some());
        assert!(recipe_for("ender_eye").is_some());
        assert!(recipe_for("dragon_egg_omelette").is_none());
        assert!(recipe_for("furnace").unwrap().needs_table());
        assert!(!recipe_for("planks").unwrap().needs_table());
    }

    #[test]
    fn test_grid_match_small_recipe() {
        let grid = vec![
            Some(ItemStack::new("oak_log", 1)),
            None,
            None,
            None,
        ];
        let out = match_grid(&grid).expect("log crafts planks");
        assert_eq!(out.name, "planks");
        assert_eq!(out.count, 4);
    }

    #[test]
    fn test_grid_match_small_recipe_in_table() {
        let mut grid = vec![None; 9];
        grid[0] = Some(ItemStack::new("blaze_powder", 1));
        grid[1] = Some(ItemStack::new("ender_pearl", 1));
        let out = match_grid(&grid).expect("eye recipe embeds top-left");
        assert_eq!(out.name, "ender_eye");
    }

    #[test]
    fn test_bed_requires_matching_wool() {
        let mut grid = vec![None; 9];
        grid[3] = Some(ItemStack::new("white_wool", 1));
        grid[4] = Some(ItemStack::new("white_wool", 1));
        grid[5] = Some(ItemStack::new("black_wool", 1));
        grid[6] = Some(ItemStack::new("planks", 1));
        grid[7] = Some(ItemStack::new("planks", 1));
        grid[8] = Some(ItemStack::new("planks", 1));
        assert!(match_grid(&grid).is_none(), "mixed wool must not craft");

        grid[5] = Some(ItemStack::new("white_wool", 1));
        assert_eq!(match_grid(&grid).unwrap().name, "white_bed");
    }

    #[test]
    fn test_choose_masked_material_needs_enough_of_one_color() {
        let recipe = recipe_for("white_bed").unwrap();
        let mut inv = Inventory::empty();
        inv.slots[0] = Some(ItemStack::new("black_wool", 2));
        inv.slots[1] = Some(ItemStack::new("white_wool", 1));
        assert_eq!(recipe.choose_masked_material(&inv), None);

        inv.slots[2] = Some(ItemStack::new("black_wool", 1));
        assert_eq!(
            recipe.choose_masked_material(&inv).as_deref(),
            Some("black_wool")
        );
    }

    #[test]
    fn test_ingredients_merge_by_family() {
        let recipe = recipe_for("furnace").unwrap();
        let merged = recipe.ingredients_per_craft();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].1, 8);
    }
}
